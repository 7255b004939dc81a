use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{MicrocosmsRepo, RepoError},
    domain::microcosms::MicrocosmSummary,
    domain::types::ItemType,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct MicrocosmRow {
    id: i64,
    site_id: i64,
    parent_id: Option<i64>,
    title: String,
    item_count: i64,
    is_deleted: bool,
    is_moderated: bool,
    created_by: i64,
    last_activity: Option<OffsetDateTime>,
}

impl From<MicrocosmRow> for MicrocosmSummary {
    fn from(row: MicrocosmRow) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            parent_id: row.parent_id,
            title: row.title,
            item_count: row.item_count,
            deleted: row.is_deleted,
            moderated: row.is_moderated,
            created_by: row.created_by,
            last_activity: row.last_activity,
        }
    }
}

#[async_trait]
impl MicrocosmsRepo for PostgresRepositories {
    async fn find_microcosm_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<MicrocosmSummary>, RepoError> {
        let row = sqlx::query_as::<_, MicrocosmRow>(
            r#"
            SELECT id, site_id, parent_id, title, item_count,
                   is_deleted, is_moderated, created_by, last_activity
            FROM microcosms
            WHERE site_id = $1 AND id = $2 AND NOT is_deleted
            "#,
        )
        .bind(site_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(MicrocosmSummary::from))
    }

    async fn list_microcosms(
        &self,
        site_id: i64,
        profile_id: i64,
    ) -> Result<Vec<MicrocosmSummary>, RepoError> {
        let rows = sqlx::query_as::<_, MicrocosmRow>(
            r#"
            SELECT m.id, m.site_id, m.parent_id, m.title, m.item_count,
                   m.is_deleted, m.is_moderated, m.created_by, m.last_activity
            FROM microcosms m
            WHERE m.site_id = $1
              AND NOT m.is_deleted
              AND NOT EXISTS (
                  SELECT 1 FROM ignores_expanded i
                  WHERE i.profile_id = $2 AND i.item_type_id = $3 AND i.item_id = m.id
              )
            ORDER BY m.id
            "#,
        )
        .bind(site_id)
        .bind(profile_id)
        .bind(ItemType::Microcosm.id())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MicrocosmSummary::from).collect())
    }
}
