//! Shared domain enumerations aligned with persisted item type identifiers.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Every addressable entity kind. The numeric ids are persisted in the
/// `flags`, `ignores` and `ymg` tables and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Site,
    Microcosm,
    Profile,
    Comment,
    Huddle,
    Conversation,
    Poll,
    Article,
    Event,
    Question,
    Classified,
    Album,
    Attendee,
    User,
    Attribute,
    Update,
    Role,
    UpdateType,
    Watcher,
    Auth,
    Attachment,
}

impl ItemType {
    pub fn id(self) -> i64 {
        match self {
            Self::Site => 1,
            Self::Microcosm => 2,
            Self::Profile => 3,
            Self::Comment => 4,
            Self::Huddle => 5,
            Self::Conversation => 6,
            Self::Poll => 7,
            Self::Article => 8,
            Self::Event => 9,
            Self::Question => 10,
            Self::Classified => 11,
            Self::Album => 12,
            Self::Attendee => 13,
            Self::User => 14,
            Self::Attribute => 15,
            Self::Update => 16,
            Self::Role => 17,
            Self::UpdateType => 18,
            Self::Watcher => 19,
            Self::Auth => 20,
            Self::Attachment => 21,
        }
    }

    pub fn from_id(id: i64) -> Result<Self, DomainError> {
        Self::all()
            .iter()
            .copied()
            .find(|item_type| item_type.id() == id)
            .ok_or_else(|| DomainError::invariant(format!("unrecognized item type id {id}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Microcosm => "microcosm",
            Self::Profile => "profile",
            Self::Comment => "comment",
            Self::Huddle => "huddle",
            Self::Conversation => "conversation",
            Self::Poll => "poll",
            Self::Article => "article",
            Self::Event => "event",
            Self::Question => "question",
            Self::Classified => "classified",
            Self::Album => "album",
            Self::Attendee => "attendee",
            Self::User => "user",
            Self::Attribute => "attribute",
            Self::Update => "update",
            Self::Role => "role",
            Self::UpdateType => "update_type",
            Self::Watcher => "watcher",
            Self::Auth => "auth",
            Self::Attachment => "attachment",
        }
    }

    /// Path segment used by the HTTP API for items of this type.
    pub fn api_collection(self) -> &'static str {
        match self {
            Self::Site => "sites",
            Self::Microcosm => "microcosms",
            Self::Profile => "profiles",
            Self::Comment => "comments",
            Self::Huddle => "huddles",
            Self::Conversation => "conversations",
            Self::Poll => "polls",
            Self::Article => "articles",
            Self::Event => "events",
            Self::Question => "questions",
            Self::Classified => "classifieds",
            Self::Album => "albums",
            Self::Attendee => "attendees",
            Self::User => "users",
            Self::Attribute => "attributes",
            Self::Update => "updates",
            Self::Role => "roles",
            Self::UpdateType => "update_types",
            Self::Watcher => "watchers",
            Self::Auth => "auth",
            Self::Attachment => "attachments",
        }
    }

    pub fn all() -> &'static [ItemType] {
        &[
            Self::Site,
            Self::Microcosm,
            Self::Profile,
            Self::Comment,
            Self::Huddle,
            Self::Conversation,
            Self::Poll,
            Self::Article,
            Self::Event,
            Self::Question,
            Self::Classified,
            Self::Album,
            Self::Attendee,
            Self::User,
            Self::Attribute,
            Self::Update,
            Self::Role,
            Self::UpdateType,
            Self::Watcher,
            Self::Auth,
            Self::Attachment,
        ]
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|item_type| item_type.as_str() == needle)
            .ok_or_else(|| DomainError::validation(format!("unknown item type `{s}`")))
    }
}

/// Identity of any addressable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_type: ItemType,
    pub item_id: i64,
}

impl ItemRef {
    pub const fn new(item_type: ItemType, item_id: i64) -> Self {
        Self { item_type, item_id }
    }

    pub const fn question(id: i64) -> Self {
        Self::new(ItemType::Question, id)
    }

    pub const fn microcosm(id: i64) -> Self {
        Self::new(ItemType::Microcosm, id)
    }

    pub const fn profile(id: i64) -> Self {
        Self::new(ItemType::Profile, id)
    }

    pub const fn watcher(id: i64) -> Self {
        Self::new(ItemType::Watcher, id)
    }
}

impl Display for ItemRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.item_type, self.item_id)
    }
}
