//! Result cache storage.
//!
//! Entries are grouped per identity inside an LRU so that `purge` can drop
//! every projection of an entity in one step. Expiry is lazy: a lapsed entry
//! is removed the first time it is read after its deadline.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::types::ItemRef;

use super::clock::Clock;
use super::config::CacheConfig;
use super::keys::{CacheKey, Projection};
use super::lock::{rw_read, rw_write};
use super::{METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_PURGE};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
    #[error("failed to encode value for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub value: serde_json::Value,
    pub expires_at: OffsetDateTime,
}

/// Storage seam for the result cache.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError>;
    fn set(&self, key: CacheKey, entry: CachedEntry) -> Result<(), CacheError>;
    fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;
    /// Drop every projection of `item`, returning how many were removed.
    fn purge(&self, item: &ItemRef) -> Result<usize, CacheError>;
}

/// Capacity-bounded in-process backend.
pub struct MemoryBackend {
    entries: RwLock<LruCache<ItemRef, HashMap<Projection, CachedEntry>>>,
}

impl MemoryBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of identities currently held.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        Ok(entries
            .get(&key.item)
            .and_then(|projections| projections.get(&key.projection))
            .cloned())
    }

    fn set(&self, key: CacheKey, entry: CachedEntry) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        match entries.get_mut(&key.item) {
            Some(projections) => {
                projections.insert(key.projection, entry);
            }
            None => {
                entries.put(key.item, HashMap::from([(key.projection, entry)]));
            }
        }
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "remove");
        let now_empty = match entries.get_mut(&key.item) {
            Some(projections) => {
                projections.remove(&key.projection);
                projections.is_empty()
            }
            None => false,
        };
        if now_empty {
            entries.pop(&key.item);
        }
        Ok(())
    }

    fn purge(&self, item: &ItemRef) -> Result<usize, CacheError> {
        let removed = rw_write(&self.entries, SOURCE, "purge").pop(item);
        Ok(removed.map_or(0, |projections| projections.len()))
    }
}

/// Process-wide cache of serialized projections with per-entry TTL.
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn in_memory(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let backend = Arc::new(MemoryBackend::new(&config));
        Self::with_backend(backend, clock, config)
    }

    pub fn with_backend(
        backend: Arc<dyn CacheBackend>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Fetch a live entry. Absent, lapsed, undecodable and faulted reads all
    /// come back as `None` so the caller falls through to the store.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = match self.backend.get(key) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    target = "microcosm::cache",
                    key = %key,
                    error = %err,
                    "cache read failed, falling back to store"
                );
                self.record_miss(key);
                return None;
            }
        };

        let Some(entry) = entry else {
            self.record_miss(key);
            return None;
        };

        if self.clock.now() >= entry.expires_at {
            debug!(target = "microcosm::cache", key = %key, "cache entry lapsed");
            if let Err(err) = self.backend.remove(key) {
                warn!(target = "microcosm::cache", key = %key, error = %err, "failed to drop lapsed entry");
            }
            self.record_miss(key);
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "projection" => key.projection.label()).increment(1);
                Some(value)
            }
            Err(err) => {
                warn!(
                    target = "microcosm::cache",
                    key = %key,
                    error = %err,
                    "cached value did not decode, discarding"
                );
                let _ = self.backend.remove(key);
                self.record_miss(key);
                None
            }
        }
    }

    /// Store with the configured result TTL.
    pub fn set<T: Serialize>(&self, key: CacheKey, value: &T) {
        self.set_with_ttl(key, value, self.config.result_ttl);
    }

    /// Store with an explicit TTL. A failed write only costs a future miss.
    pub fn set_with_ttl<T: Serialize>(&self, key: CacheKey, value: &T, ttl: Duration) {
        let result = serde_json::to_value(value)
            .map_err(|source| CacheError::Encode {
                key: key.to_string(),
                source,
            })
            .and_then(|value| {
                let entry = CachedEntry {
                    value,
                    expires_at: self.clock.now() + ttl,
                };
                self.backend.set(key, entry)
            });

        if let Err(err) = result {
            warn!(target = "microcosm::cache", key = %key, error = %err, "cache write failed");
        }
    }

    /// Remove every projection of `item`.
    pub fn purge(&self, item: &ItemRef) -> Result<(), CacheError> {
        let removed = self.backend.purge(item)?;
        counter!(METRIC_CACHE_PURGE, "item_type" => item.item_type.as_str()).increment(1);
        debug!(
            target = "microcosm::cache",
            item = %item,
            removed,
            "purged cached projections"
        );
        Ok(())
    }

    /// Purge several identities, stopping at the first fault.
    pub fn purge_all<'a>(
        &self,
        items: impl IntoIterator<Item = &'a ItemRef>,
    ) -> Result<(), CacheError> {
        for item in items {
            self.purge(item)?;
        }
        Ok(())
    }

    fn record_miss(&self, key: &CacheKey) {
        counter!(METRIC_CACHE_MISS, "projection" => key.projection.label()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;

    fn cache() -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = ResultCache::in_memory(CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[test]
    fn stores_and_returns_values() {
        let (cache, _) = cache();
        let key = CacheKey::detail(ItemRef::question(1));
        cache.set(key, &"hello".to_string());
        assert_eq!(cache.get::<String>(&key).as_deref(), Some("hello"));
    }

    #[test]
    fn lapsed_entries_are_never_served() {
        let (cache, clock) = cache();
        let key = CacheKey::summary(ItemRef::question(1));
        cache.set_with_ttl(key, &7_i64, Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get::<i64>(&key), Some(7));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get::<i64>(&key), None);
    }

    #[test]
    fn purge_beats_ttl_for_all_projections() {
        let (cache, _) = cache();
        let item = ItemRef::question(5);
        let other = ItemRef::question(6);
        cache.set(CacheKey::detail(item), &1_i64);
        cache.set(CacheKey::summary(item), &2_i64);
        cache.set(CacheKey::permissions(item, 3), &3_i64);
        cache.set(CacheKey::detail(other), &4_i64);

        cache.purge(&item).expect("purge");

        assert_eq!(cache.get::<i64>(&CacheKey::detail(item)), None);
        assert_eq!(cache.get::<i64>(&CacheKey::summary(item)), None);
        assert_eq!(cache.get::<i64>(&CacheKey::permissions(item, 3)), None);
        assert_eq!(cache.get::<i64>(&CacheKey::detail(other)), Some(4));
    }

    #[test]
    fn undecodable_entry_reads_as_miss() {
        let (cache, _) = cache();
        let key = CacheKey::detail(ItemRef::question(9));
        cache.set(key, &"not a number");
        assert_eq!(cache.get::<i64>(&key), None);
    }

    #[test]
    fn capacity_evicts_least_recent_identity() {
        let clock = Arc::new(ManualClock::default());
        let config = CacheConfig {
            capacity: 1,
            ..Default::default()
        };
        let cache = ResultCache::in_memory(config, clock);
        cache.set(CacheKey::detail(ItemRef::question(1)), &1_i64);
        cache.set(CacheKey::detail(ItemRef::question(2)), &2_i64);
        assert_eq!(cache.get::<i64>(&CacheKey::detail(ItemRef::question(1))), None);
        assert_eq!(cache.get::<i64>(&CacheKey::detail(ItemRef::question(2))), Some(2));
    }
}
