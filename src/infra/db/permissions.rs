use async_trait::async_trait;

use crate::{
    application::repos::{Lineage, PermissionsRepo, RepoError},
    domain::permissions::ContainerGrant,
    domain::types::{ItemRef, ItemType},
};

use super::{PostgresRepositories, map_sqlx_error};

/// Stored scope value for site-wide grants and default-profile rows.
const UNSCOPED: i64 = 0;

#[derive(sqlx::FromRow)]
struct GrantRow {
    can_read: bool,
    can_create: bool,
    can_update: bool,
    can_delete: bool,
    can_moderate: bool,
    guest_can_read: bool,
}

#[derive(sqlx::FromRow)]
struct LineageRow {
    container_id: Option<i64>,
    parent_id: Option<i64>,
    created_by: i64,
}

#[async_trait]
impl PermissionsRepo for PostgresRepositories {
    async fn effective_grant(
        &self,
        site_id: i64,
        microcosm_id: Option<i64>,
        profile_id: i64,
    ) -> Result<ContainerGrant, RepoError> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT can_read, can_create, can_update, can_delete, can_moderate, guest_can_read
            FROM permission_grants
            WHERE site_id = $1
              AND microcosm_id IN ($2, $4)
              AND profile_id IN ($3, $4)
            ORDER BY microcosm_id DESC, profile_id DESC
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .bind(microcosm_id.unwrap_or(UNSCOPED))
        .bind(profile_id)
        .bind(UNSCOPED)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row
            .map(|row| ContainerGrant {
                can_read: row.can_read,
                can_create: row.can_create,
                can_update: row.can_update,
                can_delete: row.can_delete,
                can_moderate: row.can_moderate,
                guest_can_read: row.guest_can_read,
            })
            .unwrap_or_else(ContainerGrant::none))
    }

    async fn find_lineage(
        &self,
        site_id: i64,
        item: ItemRef,
    ) -> Result<Option<Lineage>, RepoError> {
        let sql = match item.item_type {
            ItemType::Question => {
                r#"
                SELECT microcosm_id AS container_id, NULL::BIGINT AS parent_id, created_by
                FROM questions
                WHERE site_id = $1 AND id = $2
                "#
            }
            ItemType::Microcosm => {
                r#"
                SELECT id AS container_id, parent_id, created_by
                FROM microcosms
                WHERE site_id = $1 AND id = $2
                "#
            }
            ItemType::Profile => {
                r#"
                SELECT NULL::BIGINT AS container_id, NULL::BIGINT AS parent_id, id AS created_by
                FROM profiles
                WHERE site_id = $1 AND id = $2
                "#
            }
            ItemType::Site if item.item_id == site_id => {
                return Ok(Some(Lineage {
                    container_id: None,
                    parent: None,
                    created_by: 0,
                }));
            }
            _ => return Ok(None),
        };

        let row = sqlx::query_as::<_, LineageRow>(sql)
            .bind(site_id)
            .bind(item.item_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|row| Lineage {
            container_id: row.container_id,
            parent: row.parent_id.map(ItemRef::microcosm),
            created_by: row.created_by,
        }))
    }
}
