use serde::{Deserialize, Serialize};

/// The authenticated (or anonymous) party behind a request.
///
/// Supplied per request by the upstream auth collaborator and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub site_id: i64,
    /// `0` for anonymous visitors.
    pub profile_id: i64,
    /// Negative when the access token was rejected upstream.
    pub user_id: i64,
    pub is_site_owner: bool,
}

impl Actor {
    pub const fn anonymous(site_id: i64) -> Self {
        Self {
            site_id,
            profile_id: 0,
            user_id: 0,
            is_site_owner: false,
        }
    }

    pub const fn member(site_id: i64, profile_id: i64, user_id: i64) -> Self {
        Self {
            site_id,
            profile_id,
            user_id,
            is_site_owner: false,
        }
    }

    pub const fn site_owner(site_id: i64, profile_id: i64, user_id: i64) -> Self {
        Self {
            site_id,
            profile_id,
            user_id,
            is_site_owner: true,
        }
    }

    pub const fn is_anonymous(&self) -> bool {
        self.profile_id == 0
    }

    pub const fn has_bad_token(&self) -> bool {
        self.user_id < 0
    }

    pub const fn is_authenticated(&self) -> bool {
        self.user_id > 0 && self.profile_id > 0
    }
}
