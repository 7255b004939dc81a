//! Cache key definitions.
//!
//! Every entry is keyed by the identity of the entity it describes plus the
//! projection it holds, so purging an identity drops all of its projections.

use std::fmt::{Display, Formatter};

use crate::domain::types::{ItemRef, ItemType};

/// Which derived view of an entity an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    Detail,
    Summary,
    /// Effective container grant as seen by one profile.
    Permissions { profile_id: i64 },
}

impl Projection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Summary => "summary",
            Self::Permissions { .. } => "permissions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub item: ItemRef,
    pub projection: Projection,
}

impl CacheKey {
    pub const fn new(item: ItemRef, projection: Projection) -> Self {
        Self { item, projection }
    }

    pub const fn detail(item: ItemRef) -> Self {
        Self::new(item, Projection::Detail)
    }

    pub const fn summary(item: ItemRef) -> Self {
        Self::new(item, Projection::Summary)
    }

    pub const fn permissions(item: ItemRef, profile_id: i64) -> Self {
        Self::new(item, Projection::Permissions { profile_id })
    }

    pub const fn item_type(&self) -> ItemType {
        self.item.item_type
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let item_type = self.item.item_type;
        let id = self.item.item_id;
        match self.projection {
            Projection::Detail => write!(f, "{item_type}_d{id}"),
            Projection::Summary => write!(f, "{item_type}_s{id}"),
            Projection::Permissions { profile_id } => write!(f, "{item_type}_p{id}_{profile_id}"),
        }
    }
}
