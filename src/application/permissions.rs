//! Effective capability resolution for (actor, item).

use std::sync::Arc;

use tracing::error;

use crate::application::error::AppError;
use crate::application::repos::{Lineage, PermissionsRepo};
use crate::cache::{CacheKey, ResultCache};
use crate::domain::actor::Actor;
use crate::domain::permissions::{ContainerGrant, PermissionSet, compose};
use crate::domain::types::{ItemRef, ItemType};

/// What a permission check is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionTarget {
    pub item_type: ItemType,
    /// `0` for an item that does not exist yet.
    pub item_id: i64,
    /// Containing microcosm; `None` resolves against the site-wide grant.
    pub container_id: Option<i64>,
    pub author: Option<i64>,
}

impl PermissionTarget {
    /// A not-yet-created item inside `container_id`.
    pub const fn new_item(item_type: ItemType, container_id: i64) -> Self {
        Self {
            item_type,
            item_id: 0,
            container_id: Some(container_id),
            author: None,
        }
    }

    pub fn existing(item: ItemRef, lineage: &Lineage) -> Self {
        Self {
            item_type: item.item_type,
            item_id: item.item_id,
            container_id: lineage.container_id,
            author: Some(lineage.created_by),
        }
    }
}

#[derive(Clone)]
pub struct PermissionResolver {
    repo: Arc<dyn PermissionsRepo>,
    cache: ResultCache,
}

impl PermissionResolver {
    pub fn new(repo: Arc<dyn PermissionsRepo>, cache: ResultCache) -> Self {
        Self { repo, cache }
    }

    /// Fail-closed resolution: any lookup failure yields the empty set.
    pub async fn resolve(&self, actor: &Actor, target: PermissionTarget) -> PermissionSet {
        match self.try_resolve(actor, target).await {
            Ok(set) => set,
            Err(err) => {
                log_denied(actor, target.item_type, target.item_id, &err);
                PermissionSet::denied()
            }
        }
    }

    pub async fn try_resolve(
        &self,
        actor: &Actor,
        target: PermissionTarget,
    ) -> Result<PermissionSet, AppError> {
        if actor.is_site_owner {
            return Ok(PermissionSet::site_owner());
        }

        let grant = self.grant(actor, target.container_id).await?;
        Ok(compose(actor, &grant, target.author))
    }

    /// Resolve for an existing item, looking up its container and author.
    pub async fn try_resolve_item(
        &self,
        actor: &Actor,
        item: ItemRef,
    ) -> Result<PermissionSet, AppError> {
        let (set, _) = self.resolve_item_with_lineage(actor, item).await?;
        Ok(set)
    }

    pub async fn resolve_item(&self, actor: &Actor, item: ItemRef) -> PermissionSet {
        match self.try_resolve_item(actor, item).await {
            Ok(set) => set,
            Err(AppError::NotFound { .. }) => PermissionSet::denied(),
            Err(err) => {
                log_denied(actor, item.item_type, item.item_id, &err);
                PermissionSet::denied()
            }
        }
    }

    pub async fn resolve_item_with_lineage(
        &self,
        actor: &Actor,
        item: ItemRef,
    ) -> Result<(PermissionSet, Lineage), AppError> {
        let lineage = self
            .repo
            .find_lineage(actor.site_id, item)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} not found", item.item_type)))?;
        let set = self
            .try_resolve(actor, PermissionTarget::existing(item, &lineage))
            .await?;
        Ok((set, lineage))
    }

    async fn grant(
        &self,
        actor: &Actor,
        container_id: Option<i64>,
    ) -> Result<ContainerGrant, AppError> {
        let scope = match container_id {
            Some(id) => ItemRef::microcosm(id),
            None => ItemRef::new(ItemType::Site, actor.site_id),
        };
        let key = CacheKey::permissions(scope, actor.profile_id);
        if let Some(grant) = self.cache.get::<ContainerGrant>(&key) {
            return Ok(grant);
        }

        let grant = self
            .repo
            .effective_grant(actor.site_id, container_id, actor.profile_id)
            .await?;
        self.cache.set(key, &grant);
        Ok(grant)
    }
}

fn log_denied(actor: &Actor, item_type: ItemType, item_id: i64, err: &AppError) {
    error!(
        target = "microcosm::permissions",
        site_id = actor.site_id,
        profile_id = actor.profile_id,
        item_type = item_type.as_str(),
        item_id,
        error = %err,
        "permission lookup failed, denying"
    );
}
