//! Microcosm cache system.
//!
//! - **Result cache**: serialized detail, summary and permission projections
//!   keyed by entity identity, with per-entry TTL and purge-by-identity.
//! - **Dedup guard**: short-lived fingerprint map that makes retried creates
//!   return the first result.
//! - **Invalidation graph**: declared edges from a mutated item to the
//!   identities whose cached projections embed it.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! capacity = 10000
//! result_ttl_seconds = 86400
//! dedup_ttl_seconds = 300
//! ```

mod clock;
mod config;
mod dedup;
mod graph;
mod keys;
mod lock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use dedup::{DedupGuard, fingerprint};
pub use graph::{Dependent, InvalidationGraph, Touched};
pub use keys::{CacheKey, Projection};
pub use store::{CacheBackend, CacheError, CachedEntry, MemoryBackend, ResultCache};

pub const METRIC_CACHE_HIT: &str = "microcosm_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "microcosm_cache_miss_total";
pub const METRIC_CACHE_PURGE: &str = "microcosm_cache_purge_total";
pub const METRIC_DEDUP_HIT: &str = "microcosm_dedup_hit_total";
