//! Cache configuration.
//!
//! Controls the result cache and the duplicate-submission guard via the
//! `[cache]` section of `microcosm.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_RESULT_TTL_SECS: u64 = 60 * 60 * 24;
const DEFAULT_DEDUP_TTL_SECS: u64 = 60 * 5;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum distinct identities held by the result cache.
    pub capacity: usize,
    /// Lifetime of a cached projection when no purge intervenes.
    pub result_ttl: Duration,
    /// Window in which an identical create returns the first result.
    pub dedup_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            result_ttl: Duration::from_secs(DEFAULT_RESULT_TTL_SECS),
            dedup_ttl: Duration::from_secs(DEFAULT_DEDUP_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.capacity.get(),
            result_ttl: settings.result_ttl,
            dedup_ttl: settings.dedup_ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
