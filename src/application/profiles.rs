use std::sync::Arc;

use serde::Serialize;

use crate::application::error::AppError;
use crate::application::permissions::{PermissionResolver, PermissionTarget};
use crate::application::repos::ProfilesRepo;
use crate::cache::{CacheKey, ResultCache};
use crate::domain::actor::Actor;
use crate::domain::permissions::PermissionSet;
use crate::domain::profiles::ProfileSummary;
use crate::domain::types::{ItemRef, ItemType};

const CREATE_PROFILE_HINT: &str = "You must create a user profile for this site at api/v1/profiles/";

#[derive(Debug, Clone, Serialize)]
pub struct WhoAmI {
    #[serde(flatten)]
    pub profile: ProfileSummary,
    pub permissions: PermissionSet,
}

#[derive(Clone)]
pub struct ProfileService {
    repo: Arc<dyn ProfilesRepo>,
    cache: ResultCache,
    permissions: PermissionResolver,
}

impl ProfileService {
    pub fn new(
        repo: Arc<dyn ProfilesRepo>,
        cache: ResultCache,
        permissions: PermissionResolver,
    ) -> Self {
        Self {
            repo,
            cache,
            permissions,
        }
    }

    pub async fn summary(&self, site_id: i64, id: i64) -> Result<ProfileSummary, AppError> {
        self.find_summary(site_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("profile {id} not found")))
    }

    /// Read-through on `profile_s{id}`.
    pub async fn find_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<ProfileSummary>, AppError> {
        let key = CacheKey::summary(ItemRef::profile(id));
        if let Some(summary) = self.cache.get::<ProfileSummary>(&key) {
            if summary.site_id == site_id {
                return Ok(Some(summary));
            }
        }

        let summary = self.repo.find_profile_summary(site_id, id).await?;
        if let Some(summary) = &summary {
            self.cache.set(key, summary);
        }
        Ok(summary)
    }

    pub async fn whoami(&self, actor: &Actor) -> Result<WhoAmI, AppError> {
        if actor.has_bad_token() {
            return Err(AppError::forbidden("Bad access token supplied"));
        }
        if actor.user_id == 0 {
            return Err(AppError::forbidden(
                "You must be authenticated to ask 'who am I?'",
            ));
        }

        let profile = self
            .find_summary(actor.site_id, actor.profile_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_hint("profile not found", CREATE_PROFILE_HINT))?;

        let target = PermissionTarget {
            item_type: ItemType::Profile,
            item_id: profile.id,
            container_id: None,
            author: Some(profile.id),
        };
        let permissions = self.permissions.resolve(actor, target).await;

        Ok(WhoAmI {
            profile,
            permissions,
        })
    }
}
