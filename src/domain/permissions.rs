//! Capability sets and the pure composition rules behind them.

use serde::{Deserialize, Serialize};

use super::actor::Actor;

/// Effective capabilities of one actor on one item. Computed per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub can_moderate: bool,
    pub is_owner: bool,
    pub is_site_owner: bool,
    pub is_guest: bool,
}

impl PermissionSet {
    /// Grants nothing. Returned whenever resolution cannot complete.
    pub const fn denied() -> Self {
        Self {
            can_read: false,
            can_create: false,
            can_update: false,
            can_delete: false,
            can_moderate: false,
            is_owner: false,
            is_site_owner: false,
            is_guest: false,
        }
    }

    pub const fn site_owner() -> Self {
        Self {
            can_read: true,
            can_create: true,
            can_update: true,
            can_delete: true,
            can_moderate: true,
            is_owner: false,
            is_site_owner: true,
            is_guest: false,
        }
    }
}

/// Stored grant for (site, container, profile), roles already merged with
/// explicit overrides by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerGrant {
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub can_moderate: bool,
    pub guest_can_read: bool,
}

impl ContainerGrant {
    pub const fn none() -> Self {
        Self {
            can_read: false,
            can_create: false,
            can_update: false,
            can_delete: false,
            can_moderate: false,
            guest_can_read: false,
        }
    }

    /// Typical member grant: read and contribute, no moderation.
    pub const fn member() -> Self {
        Self {
            can_read: true,
            can_create: true,
            can_update: false,
            can_delete: false,
            can_moderate: false,
            guest_can_read: true,
        }
    }

    pub const fn moderator() -> Self {
        Self {
            can_read: true,
            can_create: true,
            can_update: true,
            can_delete: true,
            can_moderate: true,
            guest_can_read: true,
        }
    }
}

/// Compose the effective permission set.
///
/// `author_profile_id` is the author of an existing item, `None` when the
/// target is a container or a not-yet-created item.
pub fn compose(
    actor: &Actor,
    grant: &ContainerGrant,
    author_profile_id: Option<i64>,
) -> PermissionSet {
    if actor.is_site_owner {
        return PermissionSet::site_owner();
    }

    if actor.is_anonymous() {
        return PermissionSet {
            can_read: grant.guest_can_read,
            is_guest: true,
            ..PermissionSet::denied()
        };
    }

    let mut set = PermissionSet {
        can_read: grant.can_read,
        can_create: grant.can_create,
        can_update: grant.can_update,
        can_delete: grant.can_delete,
        can_moderate: grant.can_moderate,
        ..PermissionSet::denied()
    };

    let is_owner = author_profile_id.is_some_and(|author| author == actor.profile_id);
    if is_owner {
        set.is_owner = true;
        if set.can_read {
            set.can_update = true;
            set.can_delete = true;
        }
    }

    set
}
