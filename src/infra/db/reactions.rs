use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ReactionRow, ReactionsRepo, RepoError},
    domain::types::ItemRef,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct YmgRow {
    id: i64,
    profile_id: i64,
    item_profile_id: i64,
    created: OffsetDateTime,
    value: i16,
}

#[async_trait]
impl ReactionsRepo for PostgresRepositories {
    async fn find_reaction(
        &self,
        item: ItemRef,
        profile_id: i64,
    ) -> Result<Option<ReactionRow>, RepoError> {
        let row = sqlx::query_as::<_, YmgRow>(
            r#"
            SELECT id, profile_id, item_profile_id, created, value
            FROM ymg
            WHERE item_type_id = $1 AND item_id = $2 AND profile_id = $3
            "#,
        )
        .bind(item.item_type.id())
        .bind(item.item_id)
        .bind(profile_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| ReactionRow {
            id: row.id,
            item,
            profile_id: row.profile_id,
            item_profile_id: row.item_profile_id,
            created: row.created,
            value: i64::from(row.value),
        }))
    }
}
