//! Duplicate-submission suppression for creates.
//!
//! A successful create records `fingerprint -> id` for a short window; an
//! identical retry inside that window gets the original id back instead of
//! inserting again. Two identical creates racing before either commits can
//! both insert; there is no cross-request lock.
//!
//! Claims that are never retried are dropped by a sweep that runs from
//! `commit` at most once per window.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::debug;

use super::METRIC_DEDUP_HIT;
use super::clock::Clock;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::dedup";

/// Hex SHA-256 over container, normalized title and author.
pub fn fingerprint(microcosm_id: i64, normalized_title: &str, created_by: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(microcosm_id.to_string().as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalized_title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(created_by.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct DedupGuard {
    claims: DashMap<String, (i64, OffsetDateTime)>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    next_sweep: Mutex<OffsetDateTime>,
}

impl DedupGuard {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let next_sweep = Mutex::new(clock.now() + ttl);
        Self {
            claims: DashMap::new(),
            clock,
            ttl,
            next_sweep,
        }
    }

    /// The id created for `fingerprint` within the window, if any.
    pub fn try_claim(&self, fingerprint: &str) -> Option<i64> {
        let now = self.clock.now();
        let hit = self
            .claims
            .get(fingerprint)
            .map(|entry| *entry.value())
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(id, _)| id);

        match hit {
            Some(id) => {
                counter!(METRIC_DEDUP_HIT).increment(1);
                debug!(target = "microcosm::dedup", id, "duplicate create suppressed");
                Some(id)
            }
            None => {
                self.claims
                    .remove_if(fingerprint, |_, (_, expires_at)| now >= *expires_at);
                None
            }
        }
    }

    /// Record a committed create.
    pub fn commit(&self, fingerprint: String, id: i64) {
        self.commit_with_ttl(fingerprint, id, self.ttl);
    }

    pub fn commit_with_ttl(&self, fingerprint: String, id: i64, ttl: Duration) {
        let now = self.clock.now();
        self.sweep_if_due(now);
        self.claims.insert(fingerprint, (id, now + ttl));
    }

    /// Forget a claim whose question no longer exists.
    pub fn release(&self, fingerprint: &str) {
        self.claims.remove(fingerprint);
    }

    /// Drop lapsed claims.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let before = self.claims.len();
        self.claims.retain(|_, (_, expires_at)| now < *expires_at);
        let dropped = before.saturating_sub(self.claims.len());
        if dropped > 0 {
            debug!(target = "microcosm::dedup", dropped, "lapsed claims swept");
        }
    }

    fn sweep_if_due(&self, now: OffsetDateTime) {
        {
            let mut next_sweep = mutex_lock(&self.next_sweep, SOURCE, "sweep_if_due");
            if now < *next_sweep {
                return;
            }
            *next_sweep = now + self.ttl;
        }
        self.sweep();
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
