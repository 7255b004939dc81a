//! Question records, drafts and the closed set of flag patches.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;
use super::flags::ItemFlags;
use super::text::clean_sentence;

const MAX_TITLE_CHARS: usize = 150;

/// Stored question as cached under the detail projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub site_id: i64,
    pub microcosm_id: i64,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub created_by: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub edited: Option<OffsetDateTime>,
    pub edited_by: Option<i64>,
    pub edit_reason: Option<String>,
    pub flags: ItemFlags,
    pub view_count: i64,
    pub accepted_answer_id: Option<i64>,
}

/// Listing projection of a question, cached under the summary projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummaryRecord {
    pub id: i64,
    pub site_id: i64,
    pub microcosm_id: i64,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub created_by: i64,
    pub flags: ItemFlags,
    pub view_count: i64,
    pub comment_count: i64,
    pub accepted_answer_id: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_activity: Option<OffsetDateTime>,
}

/// A question about to be created by a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub microcosm_id: i64,
    pub title: String,
}

impl QuestionDraft {
    /// Canonical form used both for storage and for the dedup fingerprint.
    pub fn normalized(mut self) -> Self {
        self.title = clean_sentence(&self.title, true);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_title(&self.title)?;
        validate_microcosm_id(self.microcosm_id)
    }
}

/// A question carried over from another system, authored and dated upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedQuestion {
    pub microcosm_id: i64,
    pub title: String,
    pub created: OffsetDateTime,
    pub created_by: i64,
    pub view_count: i64,
    pub flags: ItemFlags,
    pub accepted_answer_id: Option<i64>,
}

impl ImportedQuestion {
    pub fn normalized(mut self) -> Self {
        self.title = clean_sentence(&self.title, true);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_title(&self.title)?;
        validate_microcosm_id(self.microcosm_id)?;
        if self.created_by <= 0 {
            return Err(DomainError::validation(
                "imported questions need an author profile",
            ));
        }
        Ok(())
    }
}

/// A full edit of an existing question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionEdit {
    pub id: i64,
    pub microcosm_id: i64,
    pub title: String,
    pub edit_reason: String,
}

impl QuestionEdit {
    pub fn normalized(mut self) -> Self {
        self.title = clean_sentence(&self.title, true);
        self.edit_reason = clean_sentence(&self.edit_reason, true);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_title(&self.title)?;
        if self.id < 1 {
            return Err(DomainError::validation(format!(
                "the supplied id ({}) cannot be zero or negative",
                self.id
            )));
        }
        if self.edit_reason.trim().is_empty() {
            return Err(DomainError::validation(
                "you must provide a reason for the update",
            ));
        }
        validate_microcosm_id(self.microcosm_id)
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title is a required field"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(DomainError::validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_microcosm_id(microcosm_id: i64) -> Result<(), DomainError> {
    if microcosm_id <= 0 {
        return Err(DomainError::validation("you must specify a microcosm id"));
    }
    Ok(())
}

/// The flag a patch operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagField {
    Sticky,
    Open,
    Deleted,
    Moderated,
}

impl FlagField {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/meta/flags/sticky" => Some(Self::Sticky),
            "/meta/flags/open" => Some(Self::Open),
            "/meta/flags/deleted" => Some(Self::Deleted),
            "/meta/flags/moderated" => Some(Self::Moderated),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Sticky => "is_sticky",
            Self::Open => "is_open",
            Self::Deleted => "is_deleted",
            Self::Moderated => "is_moderated",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sticky => "sticky",
            Self::Open => "open",
            Self::Deleted => "deleted",
            Self::Moderated => "moderated",
        }
    }

    pub fn read(self, flags: &ItemFlags) -> bool {
        match self {
            Self::Sticky => flags.sticky,
            Self::Open => flags.open,
            Self::Deleted => flags.deleted,
            Self::Moderated => flags.moderated,
        }
    }

    pub fn write(self, flags: &mut ItemFlags, value: bool) {
        match self {
            Self::Sticky => flags.sticky = value,
            Self::Open => flags.open = value,
            Self::Deleted => flags.deleted = value,
            Self::Moderated => flags.moderated = value,
        }
    }
}

/// One `replace` operation on a question flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionPatch {
    pub field: FlagField,
    pub value: bool,
}

impl QuestionPatch {
    pub const fn new(field: FlagField, value: bool) -> Self {
        Self { field, value }
    }

    pub fn edit_reason(&self) -> String {
        format!("Set {} to {}", self.field.as_str(), self.value)
    }
}

/// Wire shape of a patch operation: `{"op": "replace", "path": "...", "value": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl TryFrom<&PatchOperation> for QuestionPatch {
    type Error = DomainError;

    fn try_from(operation: &PatchOperation) -> Result<Self, Self::Error> {
        if operation.op != "replace" {
            return Err(DomainError::validation(format!(
                "unsupported patch operation `{}`",
                operation.op
            )));
        }
        let field = FlagField::from_path(&operation.path).ok_or_else(|| {
            DomainError::validation(format!(
                "unsupported path `{}` in patch replace operation",
                operation.path
            ))
        })?;
        let value = operation.value.as_bool().ok_or_else(|| {
            DomainError::validation(format!("`{}` expects a boolean value", operation.path))
        })?;
        Ok(Self::new(field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(op: &str, path: &str, value: serde_json::Value) -> PatchOperation {
        PatchOperation {
            op: op.to_string(),
            path: path.to_string(),
            value,
        }
    }

    #[test]
    fn replace_on_known_flag_paths_parses() {
        let patch = QuestionPatch::try_from(&op("replace", "/meta/flags/moderated", json!(true)))
            .expect("valid patch");
        assert_eq!(patch, QuestionPatch::new(FlagField::Moderated, true));
        assert_eq!(patch.edit_reason(), "Set moderated to true");
        assert_eq!(patch.field.column(), "is_moderated");
    }

    #[test]
    fn other_ops_and_paths_are_rejected() {
        assert!(QuestionPatch::try_from(&op("add", "/meta/flags/open", json!(true))).is_err());
        assert!(QuestionPatch::try_from(&op("replace", "/title", json!(true))).is_err());
        assert!(QuestionPatch::try_from(&op("replace", "/meta/flags/open", json!("yes"))).is_err());
    }

    #[test]
    fn draft_normalizes_before_validation() {
        let draft = QuestionDraft {
            microcosm_id: 3,
            title: "   ".to_string(),
        }
        .normalized();
        assert!(matches!(draft.validate(), Err(DomainError::Validation { .. })));

        let draft = QuestionDraft {
            microcosm_id: 3,
            title: "  WHERE   IS IT ".to_string(),
        }
        .normalized();
        assert_eq!(draft.title, "Where is it");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn edit_requires_reason_and_positive_id() {
        let edit = QuestionEdit {
            id: 4,
            microcosm_id: 1,
            title: "Fine".to_string(),
            edit_reason: " ".to_string(),
        }
        .normalized();
        assert!(edit.validate().is_err());

        let edit = QuestionEdit {
            id: 0,
            microcosm_id: 1,
            title: "Fine".to_string(),
            edit_reason: "typo".to_string(),
        };
        assert!(edit.validate().is_err());
    }

    #[test]
    fn flag_field_reads_and_writes() {
        let mut flags = ItemFlags::default();
        FlagField::Sticky.write(&mut flags, true);
        assert!(FlagField::Sticky.read(&flags));
        assert!(!FlagField::Open.read(&flags));
    }
}
