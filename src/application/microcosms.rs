use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::application::error::AppError;
use crate::application::permissions::{PermissionResolver, PermissionTarget};
use crate::application::repos::MicrocosmsRepo;
use crate::cache::{CacheKey, ResultCache};
use crate::domain::actor::Actor;
use crate::domain::links::Link;
use crate::domain::microcosms::{MAX_TREE_DEPTH, MicrocosmSummary, MicrocosmTreeNode, build_tree};
use crate::domain::types::{ItemRef, ItemType};

#[derive(Clone)]
pub struct MicrocosmService {
    repo: Arc<dyn MicrocosmsRepo>,
    cache: ResultCache,
    permissions: PermissionResolver,
}

impl MicrocosmService {
    pub fn new(
        repo: Arc<dyn MicrocosmsRepo>,
        cache: ResultCache,
        permissions: PermissionResolver,
    ) -> Self {
        Self {
            repo,
            cache,
            permissions,
        }
    }

    /// The microcosms the actor may read, nested under their parents.
    /// Moderated microcosms appear only to moderators; ignored ones never.
    pub async fn tree(&self, actor: &Actor) -> Result<Vec<MicrocosmTreeNode>, AppError> {
        let microcosms = self
            .repo
            .list_microcosms(actor.site_id, actor.profile_id)
            .await?;

        let mut readable = Vec::with_capacity(microcosms.len());
        for microcosm in microcosms {
            let target = PermissionTarget {
                item_type: ItemType::Microcosm,
                item_id: microcosm.id,
                container_id: Some(microcosm.id),
                author: Some(microcosm.created_by),
            };
            let permissions = self.permissions.try_resolve(actor, target).await?;
            if permissions.can_read && (!microcosm.moderated || permissions.can_moderate) {
                readable.push(microcosm);
            }
        }

        Ok(build_tree(readable))
    }

    pub async fn summary(&self, site_id: i64, id: i64) -> Result<MicrocosmSummary, AppError> {
        self.find_summary(site_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("microcosm {id} not found")))
    }

    /// Read-through on `microcosm_s{id}`.
    pub async fn find_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<MicrocosmSummary>, AppError> {
        let key = CacheKey::summary(ItemRef::microcosm(id));
        if let Some(summary) = self.cache.get::<MicrocosmSummary>(&key) {
            if summary.site_id == site_id {
                return Ok(Some(summary));
            }
        }

        let summary = self.repo.find_microcosm_summary(site_id, id).await?;
        if let Some(summary) = &summary {
            self.cache.set(key, summary);
        }
        Ok(summary)
    }

    /// Title for link decoration. Failures only cost the title.
    pub async fn title(&self, site_id: i64, id: i64) -> Option<String> {
        match self.find_summary(site_id, id).await {
            Ok(summary) => summary.map(|summary| summary.title),
            Err(err) => {
                warn!(
                    target = "microcosm::microcosms",
                    microcosm_id = id,
                    error = %err,
                    "microcosm title lookup failed"
                );
                None
            }
        }
    }

    /// Root-first chain of microcosm links ending at `id`.
    pub async fn breadcrumb(&self, site_id: i64, id: i64) -> Result<Vec<Link>, AppError> {
        let mut crumbs = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);

        while let Some(current) = next {
            if crumbs.len() >= MAX_TREE_DEPTH || !seen.insert(current) {
                warn!(
                    target = "microcosm::microcosms",
                    microcosm_id = id,
                    depth = crumbs.len(),
                    "breadcrumb walk stopped early"
                );
                break;
            }
            let Some(summary) = self.find_summary(site_id, current).await? else {
                break;
            };
            crumbs.push(Link::to_item(
                "breadcrumb",
                Some(summary.title.clone()),
                ItemRef::microcosm(summary.id),
            ));
            next = summary.parent_id.filter(|parent| *parent > 0);
        }

        crumbs.reverse();
        Ok(crumbs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::application::repos::{Lineage, PermissionsRepo, RepoError};
    use crate::cache::{CacheConfig, ManualClock};
    use crate::domain::permissions::ContainerGrant;

    struct StubRepo {
        rows: HashMap<i64, MicrocosmSummary>,
    }

    #[async_trait]
    impl MicrocosmsRepo for StubRepo {
        async fn find_microcosm_summary(
            &self,
            _site_id: i64,
            id: i64,
        ) -> Result<Option<MicrocosmSummary>, RepoError> {
            Ok(self.rows.get(&id).cloned())
        }

        async fn list_microcosms(
            &self,
            _site_id: i64,
            _profile_id: i64,
        ) -> Result<Vec<MicrocosmSummary>, RepoError> {
            Ok(self.rows.values().cloned().collect())
        }
    }

    /// Members read everything except microcosm 3; guests read nothing.
    struct StubGrants;

    #[async_trait]
    impl PermissionsRepo for StubGrants {
        async fn effective_grant(
            &self,
            _site_id: i64,
            microcosm_id: Option<i64>,
            profile_id: i64,
        ) -> Result<ContainerGrant, RepoError> {
            if profile_id == 0 || microcosm_id == Some(3) {
                return Ok(ContainerGrant::none());
            }
            Ok(ContainerGrant::member())
        }

        async fn find_lineage(
            &self,
            _site_id: i64,
            _item: ItemRef,
        ) -> Result<Option<Lineage>, RepoError> {
            Ok(None)
        }
    }

    fn microcosm(id: i64, parent_id: Option<i64>) -> MicrocosmSummary {
        MicrocosmSummary {
            id,
            site_id: 1,
            parent_id,
            title: format!("Forum {id}"),
            item_count: 0,
            deleted: false,
            moderated: false,
            created_by: 1,
            last_activity: None,
        }
    }

    fn service(rows: Vec<MicrocosmSummary>) -> MicrocosmService {
        let repo = StubRepo {
            rows: rows.into_iter().map(|row| (row.id, row)).collect(),
        };
        let cache = ResultCache::in_memory(CacheConfig::default(), Arc::new(ManualClock::default()));
        let permissions = PermissionResolver::new(Arc::new(StubGrants), cache.clone());
        MicrocosmService::new(Arc::new(repo), cache, permissions)
    }

    #[tokio::test]
    async fn breadcrumb_runs_root_first() {
        let service = service(vec![
            microcosm(1, None),
            microcosm(2, Some(1)),
            microcosm(3, Some(2)),
        ]);
        let crumbs = service.breadcrumb(1, 3).await.expect("breadcrumb");
        let hrefs: Vec<_> = crumbs.iter().map(|link| link.href.as_str()).collect();
        assert_eq!(
            hrefs,
            ["/api/v1/microcosms/1", "/api/v1/microcosms/2", "/api/v1/microcosms/3"]
        );
    }

    #[tokio::test]
    async fn breadcrumb_survives_parent_cycles() {
        let service = service(vec![microcosm(1, Some(2)), microcosm(2, Some(1))]);
        let crumbs = service.breadcrumb(1, 1).await.expect("breadcrumb");
        assert_eq!(crumbs.len(), 2);
    }

    #[tokio::test]
    async fn missing_microcosm_is_not_found() {
        let service = service(Vec::new());
        assert!(matches!(
            service.summary(1, 9).await,
            Err(AppError::NotFound { .. })
        ));
        assert_eq!(service.title(1, 9).await, None);
    }

    #[tokio::test]
    async fn tree_hides_unreadable_and_moderated_branches() {
        let mut moderated = microcosm(4, None);
        moderated.moderated = true;
        let service = service(vec![
            microcosm(1, None),
            microcosm(2, Some(1)),
            microcosm(3, None),
            microcosm(5, Some(3)),
            moderated,
        ]);

        let tree = service.tree(&Actor::member(1, 7, 7)).await.expect("tree");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].id, 2);

        let owner = service
            .tree(&Actor::site_owner(1, 9, 9))
            .await
            .expect("owner tree");
        let roots: Vec<_> = owner.iter().map(|node| node.id).collect();
        assert_eq!(roots, [1, 3, 4]);

        let guest = service.tree(&Actor::anonymous(1)).await.expect("guest tree");
        assert!(guest.is_empty());
    }
}
