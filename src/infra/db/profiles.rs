use async_trait::async_trait;

use crate::{
    application::repos::{ProfilesRepo, RepoError},
    domain::profiles::ProfileSummary,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    site_id: i64,
    user_id: i64,
    profile_name: String,
    avatar_url: Option<String>,
}

#[async_trait]
impl ProfilesRepo for PostgresRepositories {
    async fn find_profile_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<ProfileSummary>, RepoError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, site_id, user_id, profile_name, avatar_url
            FROM profiles
            WHERE site_id = $1 AND id = $2
            "#,
        )
        .bind(site_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| ProfileSummary {
            id: row.id,
            site_id: row.site_id,
            user_id: row.user_id,
            name: row.profile_name,
            avatar: row.avatar_url,
        }))
    }
}
