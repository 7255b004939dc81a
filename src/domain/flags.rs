//! Denormalized deletion/moderation bookkeeping and the visibility predicate.
//!
//! An item is visible only when the item itself, its parent (if it has one)
//! and its container are all simultaneously neither deleted nor moderated.
//! The composed bit is materialized on every mutation so listing queries can
//! filter with one indexable predicate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::types::ItemRef;

/// Deletion and moderation state of one level in the item hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFlags {
    pub deleted: bool,
    pub moderated: bool,
}

impl LevelFlags {
    pub const CLEAN: Self = Self {
        deleted: false,
        moderated: false,
    };

    pub const fn new(deleted: bool, moderated: bool) -> Self {
        Self { deleted, moderated }
    }

    pub const fn is_clean(self) -> bool {
        !(self.deleted || self.moderated)
    }
}

/// Three-level flag state for an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagState {
    pub item: LevelFlags,
    /// `None` for top-level items (a question directly inside a microcosm).
    pub parent: Option<LevelFlags>,
    pub container: LevelFlags,
}

impl FlagState {
    pub const fn new(item: LevelFlags, parent: Option<LevelFlags>, container: LevelFlags) -> Self {
        Self {
            item,
            parent,
            container,
        }
    }

    pub const fn top_level(item: LevelFlags, container: LevelFlags) -> Self {
        Self::new(item, None, container)
    }

    pub fn is_visible(&self) -> bool {
        let parent_clean = match self.parent {
            // A top-level item has no parent to hide it.
            None => true,
            Some(parent) => parent.is_clean(),
        };
        self.item.is_clean() && parent_clean && self.container.is_clean()
    }
}

/// Items and containers a profile has opted out of seeing, in expanded form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    entries: HashSet<ItemRef>,
}

impl IgnoreSet {
    pub fn new(entries: impl IntoIterator<Item = ItemRef>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ignores(&self, item: &ItemRef) -> bool {
        self.entries.contains(item)
    }

    /// True when either the item or its container has been ignored.
    pub fn hides(&self, item: &ItemRef, container: Option<&ItemRef>) -> bool {
        self.ignores(item) || container.is_some_and(|container| self.ignores(container))
    }
}

/// Visibility for a specific actor: flag visibility plus the actor's ignores.
pub fn is_visible_to(
    flags: &FlagState,
    item: &ItemRef,
    container: Option<&ItemRef>,
    ignores: &IgnoreSet,
) -> bool {
    flags.is_visible() && !ignores.hides(item, container)
}

/// Per-item presentation flags returned alongside an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub sticky: bool,
    pub open: bool,
    pub deleted: bool,
    pub moderated: bool,
    pub visible: bool,
}

impl ItemFlags {
    pub fn level(&self) -> LevelFlags {
        LevelFlags::new(self.deleted, self.moderated)
    }

    /// Recompute the materialized visibility bit against the container state.
    pub fn refresh_visibility(&mut self, parent: Option<LevelFlags>, container: LevelFlags) {
        self.visible = FlagState::new(self.level(), parent, container).is_visible();
    }
}
