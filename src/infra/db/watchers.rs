use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{RepoError, WatchersRepo},
    domain::types::{ItemRef, ItemType},
    domain::watchers::WatcherRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct WatcherRow {
    id: i64,
    site_id: i64,
    profile_id: i64,
    item_type_id: i64,
    item_id: i64,
    send_email: bool,
    send_sms: bool,
    last_notified: Option<OffsetDateTime>,
}

impl TryFrom<WatcherRow> for WatcherRecord {
    type Error = RepoError;

    fn try_from(row: WatcherRow) -> Result<Self, Self::Error> {
        let item_type = ItemType::from_id(row.item_type_id)
            .map_err(|err| RepoError::Integrity {
                message: err.to_string(),
            })?;
        Ok(Self {
            id: row.id,
            site_id: row.site_id,
            profile_id: row.profile_id,
            item: ItemRef::new(item_type, row.item_id),
            send_email: row.send_email,
            send_sms: row.send_sms,
            last_notified: row.last_notified,
        })
    }
}

#[async_trait]
impl WatchersRepo for PostgresRepositories {
    async fn find_watcher(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<WatcherRecord>, RepoError> {
        let row = sqlx::query_as::<_, WatcherRow>(
            r#"
            SELECT id, site_id, profile_id, item_type_id, item_id,
                   send_email, send_sms, last_notified
            FROM watchers
            WHERE site_id = $1 AND id = $2
            "#,
        )
        .bind(site_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(WatcherRecord::try_from).transpose()
    }

    async fn find_watcher_for_item(
        &self,
        site_id: i64,
        profile_id: i64,
        item: ItemRef,
    ) -> Result<Option<WatcherRecord>, RepoError> {
        let row = sqlx::query_as::<_, WatcherRow>(
            r#"
            SELECT id, site_id, profile_id, item_type_id, item_id,
                   send_email, send_sms, last_notified
            FROM watchers
            WHERE site_id = $1 AND profile_id = $2 AND item_type_id = $3 AND item_id = $4
            "#,
        )
        .bind(site_id)
        .bind(profile_id)
        .bind(item.item_type.id())
        .bind(item.item_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(WatcherRecord::try_from).transpose()
    }
}
