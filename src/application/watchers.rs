//! Watcher settings owned by the caller.
//!
//! A watcher is found either by its own id, which is then checked against
//! the caller, or by the watched item, which only ever matches the caller's
//! own watcher. Both writes purge the watcher identity through the
//! invalidation graph.

use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::mutation::{Mutation, MutationCoordinator, Target};
use crate::application::repos::{Statement, WatchersRepo};
use crate::cache::{CacheKey, ResultCache, Touched};
use crate::domain::actor::Actor;
use crate::domain::types::ItemRef;
use crate::domain::watchers::{WatcherPreferences, WatcherRecord};

#[derive(Clone)]
pub struct WatcherService {
    repo: Arc<dyn WatchersRepo>,
    cache: ResultCache,
    mutations: MutationCoordinator,
}

impl WatcherService {
    pub fn new(repo: Arc<dyn WatchersRepo>, cache: ResultCache, mutations: MutationCoordinator) -> Self {
        Self {
            repo,
            cache,
            mutations,
        }
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<WatcherRecord, AppError> {
        ensure_authenticated(actor)?;
        let watcher = self.load(actor.site_id, id).await?;
        ensure_owner(actor, &watcher)?;
        Ok(watcher)
    }

    /// Change how the caller hears about activity on `preferences.item`.
    pub async fn update(
        &self,
        actor: &Actor,
        preferences: WatcherPreferences,
    ) -> Result<WatcherRecord, AppError> {
        ensure_authenticated(actor)?;
        let watcher = self.for_item(actor, preferences.item).await?;

        self.execute(
            &watcher,
            Statement::UpdateWatcher {
                id: watcher.id,
                send_email: preferences.send_email,
                send_sms: preferences.send_sms,
            },
        )
        .await?;

        self.load(actor.site_id, watcher.id).await
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        let watcher = self.get(actor, id).await?;
        self.execute(&watcher, Statement::DeleteWatcher { id: watcher.id })
            .await
    }

    pub async fn delete_for_item(&self, actor: &Actor, item: ItemRef) -> Result<(), AppError> {
        ensure_authenticated(actor)?;
        let watcher = self.for_item(actor, item).await?;
        self.execute(&watcher, Statement::DeleteWatcher { id: watcher.id })
            .await
    }

    async fn execute(&self, watcher: &WatcherRecord, statement: Statement) -> Result<(), AppError> {
        let name = statement.name();
        self.mutations
            .execute(Mutation::new(
                vec![statement],
                Target::Existing(watcher.identity()),
                Touched::standalone(),
            ))
            .await?;
        info!(
            target = "microcosm::watchers",
            watcher_id = watcher.id,
            profile_id = watcher.profile_id,
            item = %watcher.item,
            statement = name,
            "watcher changed"
        );
        Ok(())
    }

    async fn for_item(&self, actor: &Actor, item: ItemRef) -> Result<WatcherRecord, AppError> {
        self.repo
            .find_watcher_for_item(actor.site_id, actor.profile_id, item)
            .await?
            .ok_or_else(watcher_not_found)
    }

    /// Read-through on `watcher_d{id}`.
    async fn load(&self, site_id: i64, id: i64) -> Result<WatcherRecord, AppError> {
        if id <= 0 {
            return Err(watcher_not_found());
        }
        let key = CacheKey::detail(ItemRef::watcher(id));
        if let Some(watcher) = self.cache.get::<WatcherRecord>(&key) {
            if watcher.site_id == site_id {
                return Ok(watcher);
            }
        }

        let watcher = self
            .repo
            .find_watcher(site_id, id)
            .await?
            .ok_or_else(watcher_not_found)?;
        self.cache.set(key, &watcher);
        Ok(watcher)
    }
}

fn ensure_authenticated(actor: &Actor) -> Result<(), AppError> {
    if actor.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::forbidden("You must be logged in to manage watchers"))
    }
}

fn ensure_owner(actor: &Actor, watcher: &WatcherRecord) -> Result<(), AppError> {
    if watcher.profile_id == actor.profile_id {
        Ok(())
    } else {
        Err(AppError::forbidden("You do not own this watcher"))
    }
}

fn watcher_not_found() -> AppError {
    AppError::not_found("watcher not found")
}
