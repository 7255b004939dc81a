//! Shared fixtures: services wired over the in-memory store with a manual clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use microcosm::application::services::{Repositories, Services};
use microcosm::cache::{
    CacheBackend, CacheConfig, CacheError, CacheKey, CachedEntry, DedupGuard, ManualClock,
    MemoryBackend, ResultCache,
};
use microcosm::domain::actor::Actor;
use microcosm::domain::permissions::ContainerGrant;
use microcosm::domain::types::ItemRef;
use microcosm::infra::memory::MemoryStore;

pub const SITE: i64 = 1;

/// Memory backend whose purges can be made to fail.
pub struct FlakyBackend {
    inner: MemoryBackend,
    fail_purge: AtomicBool,
}

impl FlakyBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: MemoryBackend::new(config),
            fail_purge: AtomicBool::new(false),
        }
    }

    pub fn fail_purges(&self, fail: bool) {
        self.fail_purge.store(fail, Ordering::SeqCst);
    }
}

impl CacheBackend for FlakyBackend {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError> {
        self.inner.get(key)
    }

    fn set(&self, key: CacheKey, entry: CachedEntry) -> Result<(), CacheError> {
        self.inner.set(key, entry)
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.inner.remove(key)
    }

    fn purge(&self, item: &ItemRef) -> Result<usize, CacheError> {
        if self.fail_purge.load(Ordering::SeqCst) {
            return Err(CacheError::backend("purge rejected"));
        }
        self.inner.purge(item)
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub cache: ResultCache,
    pub backend: Arc<FlakyBackend>,
    pub dedup: Arc<DedupGuard>,
    pub services: Services,
    pub forum: i64,
    pub member: Actor,
    pub other_member: Actor,
    pub moderator: Actor,
    pub owner: Actor,
}

impl Harness {
    /// One site with a "General" microcosm, two members, a moderator and
    /// the site owner. Members may read and post; guests may read.
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::default());
        let config = CacheConfig::default();
        let backend = Arc::new(FlakyBackend::new(&config));
        let dedup = Arc::new(DedupGuard::new(clock.clone(), config.dedup_ttl));
        let cache = ResultCache::with_backend(backend.clone(), clock.clone(), config);

        let member_id = store.add_profile(SITE, 100, "ada").await;
        let other_id = store.add_profile(SITE, 101, "grace").await;
        let moderator_id = store.add_profile(SITE, 102, "mod").await;
        let owner_id = store.add_profile(SITE, 103, "owner").await;
        let forum = store.add_microcosm(SITE, None, "General", owner_id).await;

        store
            .set_grant(SITE, None, None, ContainerGrant::member())
            .await;
        store
            .set_grant(SITE, None, Some(moderator_id), ContainerGrant::moderator())
            .await;

        let services = Services::build(
            Repositories::from_backend(Arc::new(store.clone())),
            cache.clone(),
            dedup.clone(),
        );

        Self {
            store,
            clock,
            cache,
            backend,
            dedup,
            services,
            forum,
            member: Actor::member(SITE, member_id, 100),
            other_member: Actor::member(SITE, other_id, 101),
            moderator: Actor::member(SITE, moderator_id, 102),
            owner: Actor::site_owner(SITE, owner_id, 103),
        }
    }

    pub async fn add_microcosm(&self, parent: Option<i64>, title: &str) -> i64 {
        self.store
            .add_microcosm(SITE, parent, title, self.owner.profile_id)
            .await
    }
}
