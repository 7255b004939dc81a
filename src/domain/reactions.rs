//! Yay / meh / grr reactions on any item.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;
use super::types::ItemRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionValue {
    Yay,
    Meh,
    Grr,
}

impl ReactionValue {
    pub fn stored(self) -> i16 {
        match self {
            Self::Yay => 1,
            Self::Meh => 0,
            Self::Grr => -1,
        }
    }

    pub fn from_stored(value: i64) -> Result<Self, DomainError> {
        match value {
            1 => Ok(Self::Yay),
            0 => Ok(Self::Meh),
            -1 => Ok(Self::Grr),
            other => Err(DomainError::invariant(format!(
                "stored reaction value {other} must be one of 1|0|-1"
            ))),
        }
    }
}

/// Request shape: exactly one of the three must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionChoice {
    #[serde(default)]
    pub yay: bool,
    #[serde(default)]
    pub meh: bool,
    #[serde(default)]
    pub grr: bool,
}

impl ReactionChoice {
    pub fn resolve(self) -> Result<ReactionValue, DomainError> {
        match (self.yay, self.meh, self.grr) {
            (true, false, false) => Ok(ReactionValue::Yay),
            (false, true, false) => Ok(ReactionValue::Meh),
            (false, false, true) => Ok(ReactionValue::Grr),
            (false, false, false) => Err(DomainError::validation(
                "one of yay, meh or grr must be true",
            )),
            _ => Err(DomainError::validation(
                "only one of yay, meh or grr can be true",
            )),
        }
    }
}

impl From<ReactionValue> for ReactionChoice {
    fn from(value: ReactionValue) -> Self {
        Self {
            yay: value == ReactionValue::Yay,
            meh: value == ReactionValue::Meh,
            grr: value == ReactionValue::Grr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub item: ItemRef,
    pub profile_id: i64,
    /// Author of the item being reacted to.
    pub item_profile_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub value: ReactionValue,
}
