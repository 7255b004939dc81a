//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::flags::ItemFlags;
use crate::domain::microcosms::MicrocosmSummary;
use crate::domain::permissions::ContainerGrant;
use crate::domain::profiles::ProfileSummary;
use crate::domain::questions::{FlagField, QuestionRecord, QuestionSummaryRecord};
use crate::domain::reactions::ReactionValue;
use crate::domain::reads::ReadScope;
use crate::domain::types::ItemRef;
use crate::domain::watchers::WatcherRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestionRow {
    pub site_id: i64,
    pub microcosm_id: i64,
    pub title: String,
    pub created: OffsetDateTime,
    pub created_by: i64,
    pub view_count: i64,
    pub flags: ItemFlags,
    pub accepted_answer_id: Option<i64>,
}

/// The closed set of writes the services issue inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    InsertQuestion(NewQuestionRow),
    UpdateQuestion {
        id: i64,
        microcosm_id: i64,
        title: String,
        visible: bool,
        edited: OffsetDateTime,
        edited_by: i64,
        edit_reason: String,
    },
    SetQuestionFlag {
        id: i64,
        field: FlagField,
        value: bool,
        visible: bool,
        edited: OffsetDateTime,
        edited_by: i64,
        edit_reason: String,
    },
    SoftDeleteQuestion {
        id: i64,
    },
    AdjustItemCount {
        microcosm_id: i64,
        delta: i64,
    },
    UpsertReaction {
        item: ItemRef,
        profile_id: i64,
        item_profile_id: i64,
        created: OffsetDateTime,
        value: ReactionValue,
    },
    DeleteReaction {
        item: ItemRef,
        profile_id: i64,
    },
    UpdateWatcher {
        id: i64,
        send_email: bool,
        send_sms: bool,
    },
    DeleteWatcher {
        id: i64,
    },
    /// Record `scope` as read and drop the narrower markers it supersedes.
    MarkRead {
        site_id: i64,
        profile_id: i64,
        scope: ReadScope,
        read_at: OffsetDateTime,
    },
}

impl Statement {
    pub fn name(&self) -> &'static str {
        match self {
            Statement::InsertQuestion(_) => "insert_question",
            Statement::UpdateQuestion { .. } => "update_question",
            Statement::SetQuestionFlag { .. } => "set_question_flag",
            Statement::SoftDeleteQuestion { .. } => "soft_delete_question",
            Statement::AdjustItemCount { .. } => "adjust_item_count",
            Statement::UpsertReaction { .. } => "upsert_reaction",
            Statement::DeleteReaction { .. } => "delete_reaction",
            Statement::UpdateWatcher { .. } => "update_watcher",
            Statement::DeleteWatcher { .. } => "delete_watcher",
            Statement::MarkRead { .. } => "mark_read",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOutcome {
    Inserted { id: i64 },
    Affected { rows: u64 },
}

/// One open unit of work. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn exec(&mut self, statement: &Statement) -> Result<StatementOutcome, RepoError>;
    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
    async fn rollback(self: Box<Self>) -> Result<(), RepoError>;
}

#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, RepoError>;
    async fn health_check(&self) -> Result<(), RepoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionListQuery {
    pub site_id: i64,
    pub profile_id: i64,
    pub is_site_owner: bool,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdPage {
    pub ids: Vec<i64>,
    pub total: i64,
}

#[async_trait]
pub trait QuestionsRepo: Send + Sync {
    /// Deleted questions are never returned.
    async fn find_question(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionRecord>, RepoError>;

    async fn find_question_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionSummaryRecord>, RepoError>;

    /// Visible, non-ignored questions in readable containers, sticky first
    /// then most recent activity.
    async fn list_question_ids(&self, query: &QuestionListQuery) -> Result<IdPage, RepoError>;
}

#[async_trait]
pub trait MicrocosmsRepo: Send + Sync {
    async fn find_microcosm_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<MicrocosmSummary>, RepoError>;

    /// Every live microcosm on the site except those `profile_id` ignores.
    async fn list_microcosms(
        &self,
        site_id: i64,
        profile_id: i64,
    ) -> Result<Vec<MicrocosmSummary>, RepoError>;
}

#[async_trait]
pub trait ProfilesRepo: Send + Sync {
    async fn find_profile_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<ProfileSummary>, RepoError>;
}

/// Where an item sits in the hierarchy and who wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lineage {
    pub container_id: Option<i64>,
    pub parent: Option<ItemRef>,
    pub created_by: i64,
}

#[async_trait]
pub trait PermissionsRepo: Send + Sync {
    /// Roles merged with explicit overrides. `None` container means site scope.
    async fn effective_grant(
        &self,
        site_id: i64,
        microcosm_id: Option<i64>,
        profile_id: i64,
    ) -> Result<ContainerGrant, RepoError>;

    async fn find_lineage(
        &self,
        site_id: i64,
        item: ItemRef,
    ) -> Result<Option<Lineage>, RepoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub id: i64,
    pub item: ItemRef,
    pub profile_id: i64,
    pub item_profile_id: i64,
    pub created: OffsetDateTime,
    pub value: i64,
}

#[async_trait]
pub trait ReactionsRepo: Send + Sync {
    async fn find_reaction(
        &self,
        item: ItemRef,
        profile_id: i64,
    ) -> Result<Option<ReactionRow>, RepoError>;
}

#[async_trait]
pub trait WatchersRepo: Send + Sync {
    async fn find_watcher(&self, site_id: i64, id: i64)
    -> Result<Option<WatcherRecord>, RepoError>;

    async fn find_watcher_for_item(
        &self,
        site_id: i64,
        profile_id: i64,
        item: ItemRef,
    ) -> Result<Option<WatcherRecord>, RepoError>;
}
