//! In-process storage adapter.
//!
//! Backs the test suites and the server when no database URL is configured.
//! A transaction takes the state lock for its whole lifetime and works on a
//! copy that replaces the shared state on commit, so an aborted transaction
//! leaves nothing behind.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashSet;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::repos::{
    IdPage, Lineage, MicrocosmsRepo, NewQuestionRow, PermissionsRepo, ProfilesRepo,
    QuestionListQuery, QuestionsRepo, ReactionRow, ReactionsRepo, RepoError, Statement,
    StatementOutcome, StoreGateway, StoreTransaction, WatchersRepo,
};
use crate::domain::actor::Actor;
use crate::domain::flags::{FlagState, IgnoreSet, LevelFlags, is_visible_to};
use crate::domain::microcosms::MicrocosmSummary;
use crate::domain::permissions::{ContainerGrant, compose};
use crate::domain::profiles::ProfileSummary;
use crate::domain::questions::{QuestionRecord, QuestionSummaryRecord};
use crate::domain::reads::ReadScope;
use crate::domain::types::{ItemRef, ItemType};
use crate::domain::watchers::WatcherRecord;

/// Grant rows are keyed by (site, microcosm or 0, profile or 0).
type GrantKey = (i64, i64, i64);

#[derive(Debug, Clone)]
struct QuestionRow {
    record: QuestionRecord,
    comment_count: i64,
    last_modified: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    microcosms: BTreeMap<i64, MicrocosmSummary>,
    profiles: BTreeMap<i64, ProfileSummary>,
    questions: BTreeMap<i64, QuestionRow>,
    grants: HashMap<GrantKey, ContainerGrant>,
    ignores: HashSet<(i64, ItemRef)>,
    reactions: HashMap<(ItemRef, i64), ReactionRow>,
    watchers: BTreeMap<i64, WatcherRecord>,
    /// Read markers keyed by (profile, marker item).
    reads: HashMap<(i64, ItemRef), OffsetDateTime>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Most specific row wins: container before site, profile before default.
    fn grant(&self, site_id: i64, microcosm_id: Option<i64>, profile_id: i64) -> ContainerGrant {
        let container = microcosm_id.unwrap_or(0);
        let candidates = [
            (site_id, container, profile_id),
            (site_id, container, 0),
            (site_id, 0, profile_id),
            (site_id, 0, 0),
        ];
        candidates
            .iter()
            .find_map(|key| self.grants.get(key).copied())
            .unwrap_or_else(ContainerGrant::none)
    }

    fn container_level(&self, microcosm_id: i64) -> LevelFlags {
        self.microcosms
            .get(&microcosm_id)
            .map(MicrocosmSummary::level)
            .unwrap_or(LevelFlags::CLEAN)
    }

    fn ignore_set(&self, profile_id: i64) -> IgnoreSet {
        IgnoreSet::new(
            self.ignores
                .iter()
                .filter(|(owner, _)| *owner == profile_id)
                .map(|(_, item)| *item),
        )
    }

    fn adjust_item_count(&mut self, microcosm_id: i64, delta: i64) -> Result<u64, RepoError> {
        let microcosm = self
            .microcosms
            .get_mut(&microcosm_id)
            .ok_or(RepoError::NotFound)?;
        microcosm.item_count += delta;
        Ok(1)
    }

    fn apply(&mut self, statement: &Statement) -> Result<StatementOutcome, RepoError> {
        match statement {
            Statement::InsertQuestion(row) => {
                let id = self.insert_question(row)?;
                Ok(StatementOutcome::Inserted { id })
            }
            Statement::UpdateQuestion {
                id,
                microcosm_id,
                title,
                visible,
                edited,
                edited_by,
                edit_reason,
            } => {
                if !self.microcosms.contains_key(microcosm_id) {
                    return Err(RepoError::InvalidInput {
                        message: format!("microcosm {microcosm_id} does not exist"),
                    });
                }
                let row = self.live_question(*id)?;
                row.record.microcosm_id = *microcosm_id;
                row.record.title = title.clone();
                row.record.flags.visible = *visible;
                row.record.edited = Some(*edited);
                row.record.edited_by = Some(*edited_by);
                row.record.edit_reason = Some(edit_reason.clone());
                row.last_modified = *edited;
                Ok(StatementOutcome::Affected { rows: 1 })
            }
            Statement::SetQuestionFlag {
                id,
                field,
                value,
                visible,
                edited,
                edited_by,
                edit_reason,
            } => {
                let row = self.live_question(*id)?;
                field.write(&mut row.record.flags, *value);
                row.record.flags.visible = *visible;
                row.record.edited = Some(*edited);
                row.record.edited_by = Some(*edited_by);
                row.record.edit_reason = Some(edit_reason.clone());
                row.last_modified = *edited;
                Ok(StatementOutcome::Affected { rows: 1 })
            }
            Statement::SoftDeleteQuestion { id } => {
                let row = self.live_question(*id)?;
                row.record.flags.deleted = true;
                row.record.flags.visible = false;
                Ok(StatementOutcome::Affected { rows: 1 })
            }
            Statement::AdjustItemCount {
                microcosm_id,
                delta,
            } => {
                let rows = self.adjust_item_count(*microcosm_id, *delta)?;
                Ok(StatementOutcome::Affected { rows })
            }
            Statement::UpsertReaction {
                item,
                profile_id,
                item_profile_id,
                created,
                value,
            } => {
                let key = (*item, *profile_id);
                let existing = self.reactions.get(&key).map(|row| row.id);
                let id = match existing {
                    Some(id) => id,
                    None => self.allocate_id(),
                };
                self.reactions.insert(
                    key,
                    ReactionRow {
                        id,
                        item: *item,
                        profile_id: *profile_id,
                        item_profile_id: *item_profile_id,
                        created: *created,
                        value: i64::from(value.stored()),
                    },
                );
                Ok(StatementOutcome::Inserted { id })
            }
            Statement::DeleteReaction { item, profile_id } => {
                let rows = u64::from(self.reactions.remove(&(*item, *profile_id)).is_some());
                Ok(StatementOutcome::Affected { rows })
            }
            Statement::UpdateWatcher {
                id,
                send_email,
                send_sms,
            } => {
                let watcher = self.watchers.get_mut(id).ok_or(RepoError::NotFound)?;
                watcher.send_email = *send_email;
                watcher.send_sms = *send_sms;
                Ok(StatementOutcome::Affected { rows: 1 })
            }
            Statement::DeleteWatcher { id } => {
                self.watchers.remove(id).ok_or(RepoError::NotFound)?;
                Ok(StatementOutcome::Affected { rows: 1 })
            }
            Statement::MarkRead {
                site_id,
                profile_id,
                scope,
                read_at,
            } => {
                let superseded = self.superseded_reads(*profile_id, *scope);
                for key in &superseded {
                    self.reads.remove(key);
                }
                self.reads
                    .insert((*profile_id, scope.marker(*site_id)), *read_at);
                Ok(StatementOutcome::Affected {
                    rows: superseded.len() as u64 + 1,
                })
            }
        }
    }

    /// Markers of `profile_id` that a new `scope` marker makes redundant.
    fn superseded_reads(&self, profile_id: i64, scope: ReadScope) -> Vec<(i64, ItemRef)> {
        self.reads
            .keys()
            .filter(|(owner, _)| *owner == profile_id)
            .filter(|(_, item)| match scope {
                ReadScope::Site => true,
                ReadScope::Microcosm(microcosm_id) => {
                    item.item_type == ItemType::Question
                        && self
                            .questions
                            .get(&item.item_id)
                            .is_some_and(|row| row.record.microcosm_id == microcosm_id)
                }
                ReadScope::Item(_) => false,
            })
            .copied()
            .collect()
    }

    fn insert_question(&mut self, row: &NewQuestionRow) -> Result<i64, RepoError> {
        if !self.microcosms.contains_key(&row.microcosm_id) {
            return Err(RepoError::InvalidInput {
                message: format!("microcosm {} does not exist", row.microcosm_id),
            });
        }
        let id = self.allocate_id();
        let record = QuestionRecord {
            id,
            site_id: row.site_id,
            microcosm_id: row.microcosm_id,
            title: row.title.clone(),
            created: row.created,
            created_by: row.created_by,
            edited: None,
            edited_by: None,
            edit_reason: None,
            flags: row.flags,
            view_count: row.view_count,
            accepted_answer_id: row.accepted_answer_id,
        };
        self.questions.insert(
            id,
            QuestionRow {
                record,
                comment_count: 0,
                last_modified: row.created,
            },
        );
        Ok(id)
    }

    fn live_question(&mut self, id: i64) -> Result<&mut QuestionRow, RepoError> {
        self.questions
            .get_mut(&id)
            .filter(|row| !row.record.flags.deleted)
            .ok_or(RepoError::NotFound)
    }
}

/// Shared in-memory backend implementing every repository seam.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failing_statements: Arc<DashSet<&'static str>>,
    fail_grants: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_profile(&self, site_id: i64, user_id: i64, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.profiles.insert(
            id,
            ProfileSummary {
                id,
                site_id,
                user_id,
                name: name.to_string(),
                avatar: None,
            },
        );
        id
    }

    pub async fn add_microcosm(
        &self,
        site_id: i64,
        parent_id: Option<i64>,
        title: &str,
        created_by: i64,
    ) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.microcosms.insert(
            id,
            MicrocosmSummary {
                id,
                site_id,
                parent_id,
                title: title.to_string(),
                item_count: 0,
                deleted: false,
                moderated: false,
                created_by,
                last_activity: None,
            },
        );
        id
    }

    /// `None` for either scope stores the site-wide or default-profile row.
    pub async fn set_grant(
        &self,
        site_id: i64,
        microcosm_id: Option<i64>,
        profile_id: Option<i64>,
        grant: ContainerGrant,
    ) {
        let key = (site_id, microcosm_id.unwrap_or(0), profile_id.unwrap_or(0));
        self.state.lock().await.grants.insert(key, grant);
    }

    pub async fn ignore(&self, profile_id: i64, item: ItemRef) {
        self.state.lock().await.ignores.insert((profile_id, item));
    }

    /// Moderate or delete a container, re-materializing visibility of the
    /// questions inside it.
    pub async fn set_microcosm_level(&self, microcosm_id: i64, level: LevelFlags) {
        let mut state = self.state.lock().await;
        let Some(microcosm) = state.microcosms.get_mut(&microcosm_id) else {
            return;
        };
        microcosm.deleted = level.deleted;
        microcosm.moderated = level.moderated;
        for row in state.questions.values_mut() {
            if row.record.microcosm_id == microcosm_id {
                row.record.flags.refresh_visibility(None, level);
            }
        }
    }

    /// Store a raw reaction value, bypassing domain validation.
    pub async fn put_raw_reaction(&self, item: ItemRef, profile_id: i64, value: i64) {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let item_profile_id = match item.item_type {
            ItemType::Question => state
                .questions
                .get(&item.item_id)
                .map(|row| row.record.created_by)
                .unwrap_or_default(),
            _ => 0,
        };
        state.reactions.insert(
            (item, profile_id),
            ReactionRow {
                id,
                item,
                profile_id,
                item_profile_id,
                created: OffsetDateTime::UNIX_EPOCH,
                value,
            },
        );
    }

    pub async fn add_watcher(
        &self,
        site_id: i64,
        profile_id: i64,
        item: ItemRef,
        send_email: bool,
    ) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.watchers.insert(
            id,
            WatcherRecord {
                id,
                site_id,
                profile_id,
                item,
                send_email,
                send_sms: false,
                last_notified: None,
            },
        );
        id
    }

    /// Direct view of a stored watcher.
    pub async fn watcher(&self, id: i64) -> Option<WatcherRecord> {
        self.state.lock().await.watchers.get(&id).cloned()
    }

    pub async fn read_marker(&self, profile_id: i64, item: ItemRef) -> Option<OffsetDateTime> {
        self.state
            .lock()
            .await
            .reads
            .get(&(profile_id, item))
            .copied()
    }

    pub async fn read_marker_count(&self, profile_id: i64) -> usize {
        self.state
            .lock()
            .await
            .reads
            .keys()
            .filter(|(owner, _)| *owner == profile_id)
            .count()
    }

    /// Make every statement with this name fail inside its transaction.
    pub fn fail_statement(&self, name: &'static str) {
        self.failing_statements.insert(name);
    }

    pub fn clear_failures(&self) {
        self.failing_statements.clear();
        self.fail_grants.store(false, Ordering::SeqCst);
    }

    pub fn fail_grant_lookups(&self, fail: bool) {
        self.fail_grants.store(fail, Ordering::SeqCst);
    }

    /// Direct view of a stored question, deleted ones included.
    pub async fn question_record(&self, id: i64) -> Option<QuestionRecord> {
        self.state
            .lock()
            .await
            .questions
            .get(&id)
            .map(|row| row.record.clone())
    }

    pub async fn question_count(&self) -> usize {
        self.state.lock().await.questions.len()
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failing_statements: Arc<DashSet<&'static str>>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn exec(&mut self, statement: &Statement) -> Result<StatementOutcome, RepoError> {
        if self.failing_statements.contains(statement.name()) {
            return Err(RepoError::from_persistence(format!(
                "injected failure for `{}`",
                statement.name()
            )));
        }
        self.working.apply(statement)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, RepoError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            failing_statements: self.failing_statements.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl QuestionsRepo for MemoryStore {
    async fn find_question(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .questions
            .get(&id)
            .filter(|row| row.record.site_id == site_id && !row.record.flags.deleted)
            .map(|row| row.record.clone()))
    }

    async fn find_question_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionSummaryRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .questions
            .get(&id)
            .filter(|row| row.record.site_id == site_id && !row.record.flags.deleted)
            .map(|row| QuestionSummaryRecord {
                id: row.record.id,
                site_id: row.record.site_id,
                microcosm_id: row.record.microcosm_id,
                title: row.record.title.clone(),
                created: row.record.created,
                created_by: row.record.created_by,
                flags: row.record.flags,
                view_count: row.record.view_count,
                comment_count: row.comment_count,
                accepted_answer_id: row.record.accepted_answer_id,
                last_activity: Some(row.last_modified),
            }))
    }

    async fn list_question_ids(&self, query: &QuestionListQuery) -> Result<IdPage, RepoError> {
        let state = self.state.lock().await;
        let actor = Actor {
            site_id: query.site_id,
            profile_id: query.profile_id,
            user_id: 0,
            is_site_owner: query.is_site_owner,
        };
        let ignores = state.ignore_set(query.profile_id);

        let mut rows: Vec<&QuestionRow> = state
            .questions
            .values()
            .filter(|row| row.record.site_id == query.site_id)
            .filter(|row| {
                let microcosm_id = row.record.microcosm_id;
                let item = ItemRef::question(row.record.id);
                let container = ItemRef::microcosm(microcosm_id);
                let flags =
                    FlagState::top_level(row.record.flags.level(), state.container_level(microcosm_id));
                is_visible_to(&flags, &item, Some(&container), &ignores)
            })
            .filter(|row| {
                let grant = state.grant(query.site_id, Some(row.record.microcosm_id), query.profile_id);
                compose(&actor, &grant, None).can_read
            })
            .collect();

        rows.sort_by(|a, b| {
            b.record
                .flags
                .sticky
                .cmp(&a.record.flags.sticky)
                .then(b.last_modified.cmp(&a.last_modified))
                .then(b.record.id.cmp(&a.record.id))
        });

        let total = rows.len() as i64;
        let ids = rows
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(0))
            .take(usize::try_from(query.limit).unwrap_or(0))
            .map(|row| row.record.id)
            .collect();

        Ok(IdPage { ids, total })
    }
}

#[async_trait]
impl MicrocosmsRepo for MemoryStore {
    async fn find_microcosm_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<MicrocosmSummary>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .microcosms
            .get(&id)
            .filter(|microcosm| microcosm.site_id == site_id && !microcosm.deleted)
            .cloned())
    }

    async fn list_microcosms(
        &self,
        site_id: i64,
        profile_id: i64,
    ) -> Result<Vec<MicrocosmSummary>, RepoError> {
        let state = self.state.lock().await;
        let ignores = state.ignore_set(profile_id);
        Ok(state
            .microcosms
            .values()
            .filter(|microcosm| microcosm.site_id == site_id && !microcosm.deleted)
            .filter(|microcosm| !ignores.ignores(&ItemRef::microcosm(microcosm.id)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfilesRepo for MemoryStore {
    async fn find_profile_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<ProfileSummary>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .profiles
            .get(&id)
            .filter(|profile| profile.site_id == site_id)
            .cloned())
    }
}

#[async_trait]
impl PermissionsRepo for MemoryStore {
    async fn effective_grant(
        &self,
        site_id: i64,
        microcosm_id: Option<i64>,
        profile_id: i64,
    ) -> Result<ContainerGrant, RepoError> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(self.state.lock().await.grant(site_id, microcosm_id, profile_id))
    }

    async fn find_lineage(
        &self,
        site_id: i64,
        item: ItemRef,
    ) -> Result<Option<Lineage>, RepoError> {
        let state = self.state.lock().await;
        let lineage = match item.item_type {
            ItemType::Question => state
                .questions
                .get(&item.item_id)
                .filter(|row| row.record.site_id == site_id)
                .map(|row| Lineage {
                    container_id: Some(row.record.microcosm_id),
                    parent: None,
                    created_by: row.record.created_by,
                }),
            ItemType::Microcosm => state
                .microcosms
                .get(&item.item_id)
                .filter(|microcosm| microcosm.site_id == site_id)
                .map(|microcosm| Lineage {
                    container_id: Some(microcosm.id),
                    parent: microcosm.parent_id.map(ItemRef::microcosm),
                    created_by: microcosm.created_by,
                }),
            ItemType::Profile => state
                .profiles
                .get(&item.item_id)
                .filter(|profile| profile.site_id == site_id)
                .map(|profile| Lineage {
                    container_id: None,
                    parent: None,
                    created_by: profile.id,
                }),
            ItemType::Site if item.item_id == site_id => Some(Lineage {
                container_id: None,
                parent: None,
                created_by: 0,
            }),
            _ => None,
        };
        Ok(lineage)
    }
}

#[async_trait]
impl ReactionsRepo for MemoryStore {
    async fn find_reaction(
        &self,
        item: ItemRef,
        profile_id: i64,
    ) -> Result<Option<ReactionRow>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.reactions.get(&(item, profile_id)).cloned())
    }
}

#[async_trait]
impl WatchersRepo for MemoryStore {
    async fn find_watcher(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<WatcherRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .watchers
            .get(&id)
            .filter(|watcher| watcher.site_id == site_id)
            .cloned())
    }

    async fn find_watcher_for_item(
        &self,
        site_id: i64,
        profile_id: i64,
        item: ItemRef,
    ) -> Result<Option<WatcherRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .watchers
            .values()
            .find(|watcher| {
                watcher.site_id == site_id
                    && watcher.profile_id == profile_id
                    && watcher.item == item
            })
            .cloned())
    }
}
