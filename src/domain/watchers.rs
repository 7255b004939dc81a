//! A profile's subscription to activity on one item.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::types::ItemRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherRecord {
    pub id: i64,
    pub site_id: i64,
    pub profile_id: i64,
    pub item: ItemRef,
    pub send_email: bool,
    pub send_sms: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_notified: Option<OffsetDateTime>,
}

impl WatcherRecord {
    pub fn identity(&self) -> ItemRef {
        ItemRef::watcher(self.id)
    }
}

/// Delivery settings for the caller's watcher on `item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherPreferences {
    pub item: ItemRef,
    pub send_email: bool,
    pub send_sms: bool,
}
