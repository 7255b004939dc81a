use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::flags::ItemFlags;
use crate::domain::questions::{ImportedQuestion, QuestionDraft, QuestionEdit};
use crate::domain::error::DomainError;
use crate::domain::reactions::{Reaction, ReactionChoice};
use crate::domain::reads::ReadScope;
use crate::domain::types::{ItemRef, ItemType};
use crate::domain::watchers::WatcherPreferences;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuestionCreateRequest {
    #[serde(alias = "microcosmId")]
    pub microcosm_id: i64,
    #[serde(default)]
    pub title: String,
}

impl From<QuestionCreateRequest> for QuestionDraft {
    fn from(request: QuestionCreateRequest) -> Self {
        Self {
            microcosm_id: request.microcosm_id,
            title: request.title,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuestionUpdateRequest {
    #[serde(alias = "microcosmId")]
    pub microcosm_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "editReason")]
    pub edit_reason: String,
}

impl QuestionUpdateRequest {
    pub fn into_edit(self, id: i64) -> QuestionEdit {
        QuestionEdit {
            id,
            microcosm_id: self.microcosm_id,
            title: self.title,
            edit_reason: self.edit_reason,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuestionImportRequest {
    #[serde(alias = "microcosmId")]
    pub microcosm_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(alias = "createdBy")]
    pub created_by: i64,
    #[serde(default, alias = "viewCount")]
    pub view_count: i64,
    #[serde(default)]
    pub flags: ItemFlags,
    #[serde(default, alias = "acceptedAnswerId")]
    pub accepted_answer_id: Option<i64>,
}

impl From<QuestionImportRequest> for ImportedQuestion {
    fn from(request: QuestionImportRequest) -> Self {
        Self {
            microcosm_id: request.microcosm_id,
            title: request.title,
            created: request.created,
            created_by: request.created_by,
            view_count: request.view_count,
            flags: request.flags,
            accepted_answer_id: request.accepted_answer_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    #[serde(rename = "itemType", alias = "item_type")]
    pub item_type: String,
    #[serde(default, rename = "itemId", alias = "item_id")]
    pub item_id: i64,
    /// Container for a not-yet-created item (`itemId` of 0).
    #[serde(default, rename = "microcosmId", alias = "microcosm_id")]
    pub microcosm_id: Option<i64>,
}

/// `?itemType=&itemId=` naming an existing item.
#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    #[serde(rename = "itemType", alias = "item_type")]
    pub item_type: String,
    #[serde(rename = "itemId", alias = "item_id")]
    pub item_id: i64,
}

impl ItemQuery {
    pub fn item(&self) -> Result<ItemRef, DomainError> {
        existing_item(&self.item_type, self.item_id)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WatcherUpdateRequest {
    #[serde(alias = "itemType")]
    pub item_type: String,
    #[serde(alias = "itemId")]
    pub item_id: i64,
    #[serde(default, alias = "sendEmail")]
    pub send_email: bool,
    #[serde(default, alias = "sendSMS", alias = "sendSms")]
    pub send_sms: bool,
}

impl WatcherUpdateRequest {
    pub fn into_preferences(self) -> Result<WatcherPreferences, DomainError> {
        Ok(WatcherPreferences {
            item: existing_item(&self.item_type, self.item_id)?,
            send_email: self.send_email,
            send_sms: self.send_sms,
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReadScopeRequest {
    #[serde(alias = "itemType")]
    pub item_type: String,
    #[serde(default, alias = "itemId")]
    pub item_id: i64,
}

impl ReadScopeRequest {
    pub fn scope(&self) -> Result<ReadScope, DomainError> {
        ReadScope::parse(&self.item_type, self.item_id)
    }
}

fn existing_item(item_type: &str, item_id: i64) -> Result<ItemRef, DomainError> {
    let item_type: ItemType = item_type.parse()?;
    if item_id <= 0 {
        return Err(DomainError::validation("itemId must be greater than zero"));
    }
    Ok(ItemRef::new(item_type, item_id))
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub profile_id: i64,
    pub item_profile_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(flatten)]
    pub choice: ReactionChoice,
}

impl From<Reaction> for ReactionResponse {
    fn from(reaction: Reaction) -> Self {
        Self {
            id: reaction.id,
            item_type: reaction.item.item_type,
            item_id: reaction.item.item_id,
            profile_id: reaction.profile_id,
            item_profile_id: reaction.item_profile_id,
            created: reaction.created,
            choice: ReactionChoice::from(reaction.value),
        }
    }
}
