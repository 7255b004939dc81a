//! "Mark as read" scopes.

use super::error::DomainError;
use super::types::{ItemRef, ItemType};

/// What a read marker covers. A wider scope supersedes the markers of the
/// items inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Everything on the caller's site.
    Site,
    /// Every item inside one microcosm.
    Microcosm(i64),
    Item(ItemRef),
}

impl ReadScope {
    /// `item_id` is ignored for the site scope and must be positive otherwise.
    pub fn parse(item_type: &str, item_id: i64) -> Result<Self, DomainError> {
        let item_type: ItemType = item_type
            .parse()
            .map_err(|_| DomainError::validation(format!("Unknown item type `{item_type}`")))?;

        match item_type {
            ItemType::Site => Ok(Self::Site),
            _ if item_id <= 0 => Err(DomainError::validation(
                "itemId must be greater than zero",
            )),
            ItemType::Microcosm => Ok(Self::Microcosm(item_id)),
            other => Ok(Self::Item(ItemRef::new(other, item_id))),
        }
    }

    /// The row that records this scope for a profile on `site_id`.
    pub fn marker(self, site_id: i64) -> ItemRef {
        match self {
            Self::Site => ItemRef::new(ItemType::Site, site_id),
            Self::Microcosm(id) => ItemRef::microcosm(id),
            Self::Item(item) => item,
        }
    }
}
