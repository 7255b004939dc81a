//! Question reads and writes.
//!
//! Every operation resolves permissions before touching the cache or the
//! store. Reads go through the result cache and re-hydrate author profiles,
//! links and breadcrumbs on every call; writes go through the mutation
//! coordinator so the question and its container are purged after commit.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::microcosms::MicrocosmService;
use crate::application::mutation::{Mutation, MutationCoordinator, Target};
use crate::application::pagination::{Page, PageRequest};
use crate::application::permissions::{PermissionResolver, PermissionTarget};
use crate::application::profiles::ProfileService;
use crate::application::repos::{NewQuestionRow, QuestionListQuery, QuestionsRepo, Statement};
use crate::cache::{CacheKey, Clock, DedupGuard, ResultCache, Touched, fingerprint};
use crate::domain::actor::Actor;
use crate::domain::flags::{FlagState, ItemFlags, LevelFlags};
use crate::domain::links::Link;
use crate::domain::microcosms::MicrocosmSummary;
use crate::domain::permissions::PermissionSet;
use crate::domain::profiles::ProfileSummary;
use crate::domain::questions::{
    FlagField, ImportedQuestion, PatchOperation, QuestionDraft, QuestionEdit, QuestionPatch,
    QuestionRecord, QuestionSummaryRecord,
};
use crate::domain::types::{ItemRef, ItemType};

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub record: QuestionRecord,
    pub author: Option<ProfileSummary>,
    pub editor: Option<ProfileSummary>,
    pub links: Vec<Link>,
    pub breadcrumb: Vec<Link>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionSummaryView {
    #[serde(flatten)]
    pub summary: QuestionSummaryRecord,
    pub author: Option<ProfileSummary>,
    pub links: Vec<Link>,
}

#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionsRepo>,
    microcosms: MicrocosmService,
    profiles: ProfileService,
    permissions: PermissionResolver,
    cache: ResultCache,
    dedup: Arc<DedupGuard>,
    mutations: MutationCoordinator,
    clock: Arc<dyn Clock>,
}

impl QuestionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        questions: Arc<dyn QuestionsRepo>,
        microcosms: MicrocosmService,
        profiles: ProfileService,
        permissions: PermissionResolver,
        cache: ResultCache,
        dedup: Arc<DedupGuard>,
        mutations: MutationCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            questions,
            microcosms,
            profiles,
            permissions,
            cache,
            dedup,
            mutations,
            clock,
        }
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<QuestionView, AppError> {
        let permissions = self.authorize_read(actor, id).await?;
        let record = self.load_record(actor.site_id, id).await?;
        let container = self
            .ensure_visible(actor.site_id, &record.flags, record.microcosm_id, &permissions)
            .await?;
        self.hydrate(actor.site_id, record, &container).await
    }

    pub async fn get_summary(
        &self,
        actor: &Actor,
        id: i64,
    ) -> Result<QuestionSummaryView, AppError> {
        let permissions = self.authorize_read(actor, id).await?;
        let summary = self
            .load_summary(actor.site_id, id)
            .await?
            .ok_or_else(question_not_found)?;
        self.ensure_visible(actor.site_id, &summary.flags, summary.microcosm_id, &permissions)
            .await?;
        self.hydrate_summary(actor.site_id, summary).await
    }

    pub async fn get_page(
        &self,
        actor: &Actor,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<QuestionSummaryView>, AppError> {
        let request = PageRequest::parse(limit, offset)?;
        let ids = self
            .questions
            .list_question_ids(&QuestionListQuery {
                site_id: actor.site_id,
                profile_id: actor.profile_id,
                is_site_owner: actor.is_site_owner,
                limit: request.limit,
                offset: request.offset,
            })
            .await?;
        request.ensure_within(ids.total)?;

        let mut items = Vec::with_capacity(ids.ids.len());
        for id in ids.ids {
            match self.load_summary(actor.site_id, id).await? {
                Some(summary) => items.push(self.hydrate_summary(actor.site_id, summary).await?),
                None => warn!(
                    target = "microcosm::questions",
                    question_id = id,
                    "listed question vanished before hydration"
                ),
            }
        }

        Ok(Page::new(items, ids.total, request))
    }

    /// Create a question. An identical retry inside the dedup window returns
    /// the question created first, whether or not readers can still see it.
    pub async fn insert(
        &self,
        actor: &Actor,
        draft: QuestionDraft,
    ) -> Result<QuestionView, AppError> {
        let draft = draft.normalized();

        let permissions = self
            .permissions
            .try_resolve(
                actor,
                PermissionTarget::new_item(ItemType::Question, draft.microcosm_id),
            )
            .await?;
        if !permissions.can_create {
            return Err(AppError::forbidden(
                "You do not have permission to create a question in this microcosm",
            ));
        }

        let fingerprint = fingerprint(draft.microcosm_id, &draft.title, actor.profile_id);
        if let Some(existing) = self.dedup.try_claim(&fingerprint) {
            match self.committed_view(actor.site_id, existing).await {
                Ok(view) => {
                    info!(
                        target = "microcosm::questions",
                        question_id = existing,
                        profile_id = actor.profile_id,
                        "returning previously created question"
                    );
                    return Ok(view);
                }
                Err(AppError::NotFound { .. }) => {
                    warn!(
                        target = "microcosm::questions",
                        question_id = existing,
                        "claimed question is gone, creating again"
                    );
                    self.dedup.release(&fingerprint);
                }
                Err(err) => return Err(err),
            }
        }

        draft.validate()?;
        let container = self
            .microcosms
            .summary(actor.site_id, draft.microcosm_id)
            .await?;

        let mut flags = ItemFlags {
            open: true,
            ..ItemFlags::default()
        };
        flags.refresh_visibility(None, container.level());

        let row = NewQuestionRow {
            site_id: actor.site_id,
            microcosm_id: draft.microcosm_id,
            title: draft.title,
            created: self.clock.now(),
            created_by: actor.profile_id,
            view_count: 0,
            flags,
            accepted_answer_id: None,
        };

        let id = self.insert_row(row).await?;
        self.dedup.commit(fingerprint, id);
        self.committed_view(actor.site_id, id).await
    }

    /// Carry over a question authored elsewhere. Site owners only.
    pub async fn import(
        &self,
        actor: &Actor,
        question: ImportedQuestion,
    ) -> Result<QuestionView, AppError> {
        if !actor.is_site_owner {
            return Err(AppError::forbidden("Only a site owner can import questions"));
        }

        let question = question.normalized();
        question.validate()?;

        let mut flags = question.flags;
        flags.refresh_visibility(None, LevelFlags::CLEAN);

        let row = NewQuestionRow {
            site_id: actor.site_id,
            microcosm_id: question.microcosm_id,
            title: question.title,
            created: question.created,
            created_by: question.created_by,
            view_count: question.view_count,
            flags,
            accepted_answer_id: question.accepted_answer_id,
        };

        let id = self.insert_row(row).await?;
        self.committed_view(actor.site_id, id).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        edit: QuestionEdit,
    ) -> Result<QuestionView, AppError> {
        let edit = edit.normalized();
        edit.validate()?;

        let item = ItemRef::question(edit.id);
        let permissions = self.permissions.try_resolve_item(actor, item).await?;
        if !permissions.can_update {
            return Err(AppError::forbidden(
                "You do not have permission to update this question",
            ));
        }

        let current = self.load_record(actor.site_id, edit.id).await?;
        let from = current.microcosm_id;
        let to = edit.microcosm_id;

        if to != from {
            let destination = self
                .permissions
                .try_resolve(actor, PermissionTarget::new_item(ItemType::Question, to))
                .await?;
            if !destination.can_create {
                return Err(AppError::forbidden(
                    "You do not have permission to move this question there",
                ));
            }
        }
        let container = self.microcosms.summary(actor.site_id, to).await?;

        let mut flags = current.flags;
        flags.refresh_visibility(None, container.level());

        let mut statements = vec![Statement::UpdateQuestion {
            id: edit.id,
            microcosm_id: to,
            title: edit.title,
            visible: flags.visible,
            edited: self.clock.now(),
            edited_by: actor.profile_id,
            edit_reason: edit.edit_reason,
        }];
        if to != from {
            statements.push(Statement::AdjustItemCount {
                microcosm_id: from,
                delta: -1,
            });
            statements.push(Statement::AdjustItemCount {
                microcosm_id: to,
                delta: 1,
            });
        }

        self.mutations
            .execute(Mutation::new(
                statements,
                Target::Existing(item),
                Touched::moved(from, to),
            ))
            .await?;

        self.committed_view(actor.site_id, edit.id).await
    }

    /// Apply `replace` operations on the question flags.
    pub async fn patch(
        &self,
        actor: &Actor,
        id: i64,
        operations: &[PatchOperation],
    ) -> Result<(), AppError> {
        if operations.is_empty() {
            return Err(AppError::invalid_input("no patch operations supplied"));
        }
        let patches = operations
            .iter()
            .map(QuestionPatch::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let item = ItemRef::question(id);
        let permissions = self.permissions.try_resolve_item(actor, item).await?;
        for patch in &patches {
            authorize_flag(&permissions, patch.field)?;
        }

        let current = self.load_record(actor.site_id, id).await?;
        let container = self
            .microcosms
            .summary(actor.site_id, current.microcosm_id)
            .await?;

        let now = self.clock.now();
        let mut flags = current.flags;
        let mut statements = Vec::with_capacity(patches.len());

        for patch in patches {
            if patch.field.read(&flags) == patch.value {
                return Err(AppError::conflict(format!(
                    "{} is already {}",
                    patch.field.as_str(),
                    patch.value
                )));
            }
            patch.field.write(&mut flags, patch.value);
            flags.refresh_visibility(None, container.level());

            statements.push(Statement::SetQuestionFlag {
                id,
                field: patch.field,
                value: patch.value,
                visible: flags.visible,
                edited: now,
                edited_by: actor.profile_id,
                edit_reason: patch.edit_reason(),
            });
            if patch.field == FlagField::Deleted {
                statements.push(Statement::AdjustItemCount {
                    microcosm_id: current.microcosm_id,
                    delta: if patch.value { -1 } else { 1 },
                });
            }
        }

        self.mutations
            .execute(Mutation::new(
                statements,
                Target::Existing(item),
                Touched::in_container(current.microcosm_id),
            ))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        if id <= 0 {
            return Err(question_not_found());
        }
        let item = ItemRef::question(id);
        let permissions = self.permissions.try_resolve_item(actor, item).await?;
        if !permissions.can_delete {
            return Err(AppError::forbidden(
                "You do not have permission to delete this question",
            ));
        }

        let current = self.load_record(actor.site_id, id).await?;
        self.mutations
            .execute(Mutation::new(
                vec![
                    Statement::SoftDeleteQuestion { id },
                    Statement::AdjustItemCount {
                        microcosm_id: current.microcosm_id,
                        delta: -1,
                    },
                ],
                Target::Existing(item),
                Touched::in_container(current.microcosm_id),
            ))
            .await?;
        Ok(())
    }

    async fn insert_row(&self, row: NewQuestionRow) -> Result<i64, AppError> {
        let microcosm_id = row.microcosm_id;
        let result = self
            .mutations
            .execute(Mutation::new(
                vec![
                    Statement::InsertQuestion(row),
                    Statement::AdjustItemCount {
                        microcosm_id,
                        delta: 1,
                    },
                ],
                Target::Inserted(ItemType::Question),
                Touched::in_container(microcosm_id),
            ))
            .await?;
        result
            .inserted_id()
            .ok_or_else(|| AppError::internal("question insert returned no id"))
    }

    /// The question as its writer sees it once the write is durable. Not
    /// gated on visibility, so a create landing in a moderated container
    /// still reports success.
    async fn committed_view(&self, site_id: i64, id: i64) -> Result<QuestionView, AppError> {
        let record = self.load_record(site_id, id).await?;
        let container = self
            .microcosms
            .summary(site_id, record.microcosm_id)
            .await?;
        self.hydrate(site_id, record, &container).await
    }

    async fn authorize_read(&self, actor: &Actor, id: i64) -> Result<PermissionSet, AppError> {
        if id <= 0 {
            return Err(question_not_found());
        }
        let permissions = self
            .permissions
            .try_resolve_item(actor, ItemRef::question(id))
            .await?;
        if !permissions.can_read {
            return Err(AppError::forbidden(
                "You do not have permission to view this question",
            ));
        }
        Ok(permissions)
    }

    async fn ensure_visible(
        &self,
        site_id: i64,
        flags: &ItemFlags,
        microcosm_id: i64,
        permissions: &PermissionSet,
    ) -> Result<MicrocosmSummary, AppError> {
        let container = self.microcosms.summary(site_id, microcosm_id).await?;
        let state = FlagState::top_level(flags.level(), container.level());
        if !state.is_visible() && !permissions.can_moderate {
            return Err(question_not_found());
        }
        Ok(container)
    }

    async fn load_record(&self, site_id: i64, id: i64) -> Result<QuestionRecord, AppError> {
        let key = CacheKey::detail(ItemRef::question(id));
        if let Some(record) = self.cache.get::<QuestionRecord>(&key) {
            if record.site_id == site_id {
                return Ok(record);
            }
        }

        let record = self
            .questions
            .find_question(site_id, id)
            .await?
            .ok_or_else(question_not_found)?;
        self.cache.set(key, &record);
        Ok(record)
    }

    async fn load_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionSummaryRecord>, AppError> {
        let key = CacheKey::summary(ItemRef::question(id));
        if let Some(summary) = self.cache.get::<QuestionSummaryRecord>(&key) {
            if summary.site_id == site_id {
                return Ok(Some(summary));
            }
        }

        let summary = self.questions.find_question_summary(site_id, id).await?;
        if let Some(summary) = &summary {
            self.cache.set(key, summary);
        }
        Ok(summary)
    }

    async fn hydrate(
        &self,
        site_id: i64,
        record: QuestionRecord,
        container: &MicrocosmSummary,
    ) -> Result<QuestionView, AppError> {
        let author = self.profiles.find_summary(site_id, record.created_by).await?;
        let editor = match record.edited_by {
            Some(editor) if editor > 0 => self.profiles.find_summary(site_id, editor).await?,
            _ => None,
        };
        let links = vec![
            Link::to_item("self", None, ItemRef::question(record.id)),
            Link::to_item(
                "microcosm",
                Some(container.title.clone()),
                ItemRef::microcosm(container.id),
            ),
        ];
        let breadcrumb = self
            .microcosms
            .breadcrumb(site_id, record.microcosm_id)
            .await?;

        Ok(QuestionView {
            record,
            author,
            editor,
            links,
            breadcrumb,
        })
    }

    async fn hydrate_summary(
        &self,
        site_id: i64,
        summary: QuestionSummaryRecord,
    ) -> Result<QuestionSummaryView, AppError> {
        let author = self
            .profiles
            .find_summary(site_id, summary.created_by)
            .await?;
        let title = self.microcosms.title(site_id, summary.microcosm_id).await;
        let links = vec![
            Link::to_item("self", None, ItemRef::question(summary.id)),
            Link::to_item("microcosm", title, ItemRef::microcosm(summary.microcosm_id)),
        ];

        Ok(QuestionSummaryView {
            summary,
            author,
            links,
        })
    }
}

/// Sticky and moderated are moderator-only; authors may open/close and
/// delete their own questions.
fn authorize_flag(permissions: &PermissionSet, field: FlagField) -> Result<(), AppError> {
    let allowed = match field {
        FlagField::Sticky | FlagField::Moderated => permissions.can_moderate,
        FlagField::Open => {
            permissions.can_moderate || (permissions.is_owner && permissions.can_update)
        }
        FlagField::Deleted => {
            permissions.can_moderate || (permissions.is_owner && permissions.can_delete)
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "You do not have permission to change the {} flag",
            field.as_str()
        )))
    }
}

fn question_not_found() -> AppError {
    AppError::not_found("question not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_permissions_follow_ownership_rules() {
        let owner = PermissionSet {
            can_read: true,
            can_update: true,
            can_delete: true,
            is_owner: true,
            ..PermissionSet::denied()
        };
        assert!(authorize_flag(&owner, FlagField::Open).is_ok());
        assert!(authorize_flag(&owner, FlagField::Deleted).is_ok());
        assert!(authorize_flag(&owner, FlagField::Sticky).is_err());
        assert!(authorize_flag(&owner, FlagField::Moderated).is_err());

        let bystander = PermissionSet {
            can_read: true,
            can_update: true,
            ..PermissionSet::denied()
        };
        assert!(authorize_flag(&bystander, FlagField::Open).is_err());

        let moderator = PermissionSet {
            can_moderate: true,
            ..PermissionSet::denied()
        };
        for field in [
            FlagField::Sticky,
            FlagField::Open,
            FlagField::Deleted,
            FlagField::Moderated,
        ] {
            assert!(authorize_flag(&moderator, field).is_ok());
        }
    }
}
