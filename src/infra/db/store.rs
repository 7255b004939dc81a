use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;

use crate::{
    application::repos::{
        NewQuestionRow, RepoError, Statement, StatementOutcome, StoreGateway, StoreTransaction,
    },
    domain::questions::FlagField,
    domain::reads::ReadScope,
    domain::types::ItemType,
};

use super::{PostgresRepositories, map_sqlx_error};

/// An open Postgres transaction. sqlx rolls it back when dropped uncommitted.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreGateway for PostgresRepositories {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, RepoError> {
        let tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn exec(&mut self, statement: &Statement) -> Result<StatementOutcome, RepoError> {
        match statement {
            Statement::InsertQuestion(row) => self.insert_question(row).await,
            Statement::UpdateQuestion {
                id,
                microcosm_id,
                title,
                visible,
                edited,
                edited_by,
                edit_reason,
            } => {
                let result = sqlx::query(
                    r#"
                    UPDATE questions
                    SET microcosm_id = $2, title = $3, is_visible = $4,
                        edited = $5, edited_by = $6, edit_reason = $7
                    WHERE id = $1 AND NOT is_deleted
                    "#,
                )
                .bind(id)
                .bind(microcosm_id)
                .bind(title)
                .bind(visible)
                .bind(edited)
                .bind(edited_by)
                .bind(edit_reason)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
                ensure_affected(result.rows_affected())?;

                sqlx::query(
                    r#"
                    UPDATE flags f
                    SET microcosm_id = m.id,
                        microcosm_is_deleted = m.is_deleted,
                        microcosm_is_moderated = m.is_moderated,
                        is_visible = $3,
                        last_modified = $4
                    FROM microcosms m
                    WHERE f.item_type_id = $5 AND f.item_id = $1 AND m.id = $2
                    "#,
                )
                .bind(id)
                .bind(microcosm_id)
                .bind(visible)
                .bind(edited)
                .bind(ItemType::Question.id())
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::SetQuestionFlag {
                id,
                field,
                value,
                visible,
                edited,
                edited_by,
                edit_reason,
            } => {
                // Column names come from the closed `FlagField` set.
                let sql = format!(
                    "UPDATE questions \
                     SET {column} = $2, is_visible = $3, edited = $4, edited_by = $5, edit_reason = $6 \
                     WHERE id = $1 AND NOT is_deleted",
                    column = field.column()
                );
                let result = sqlx::query(&sql)
                    .bind(id)
                    .bind(value)
                    .bind(visible)
                    .bind(edited)
                    .bind(edited_by)
                    .bind(edit_reason)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;
                ensure_affected(result.rows_affected())?;

                let flags_update = match field {
                    FlagField::Sticky => Some("item_is_sticky"),
                    FlagField::Deleted => Some("item_is_deleted"),
                    FlagField::Moderated => Some("item_is_moderated"),
                    FlagField::Open => None,
                }
                .map(|column| {
                    format!(
                        "UPDATE flags SET {column} = $3, is_visible = $4, last_modified = $5 \
                         WHERE item_type_id = $1 AND item_id = $2"
                    )
                });
                let flags_query = match &flags_update {
                    Some(sql) => sqlx::query(sql)
                        .bind(ItemType::Question.id())
                        .bind(id)
                        .bind(value),
                    None => sqlx::query(
                        "UPDATE flags SET is_visible = $3, last_modified = $4 \
                         WHERE item_type_id = $1 AND item_id = $2",
                    )
                    .bind(ItemType::Question.id())
                    .bind(id),
                };
                flags_query
                    .bind(visible)
                    .bind(edited)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::SoftDeleteQuestion { id } => {
                let result = sqlx::query(
                    "UPDATE questions SET is_deleted = TRUE, is_visible = FALSE \
                     WHERE id = $1 AND NOT is_deleted",
                )
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
                ensure_affected(result.rows_affected())?;

                sqlx::query(
                    "UPDATE flags SET item_is_deleted = TRUE, is_visible = FALSE \
                     WHERE item_type_id = $1 AND item_id = $2",
                )
                .bind(ItemType::Question.id())
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::AdjustItemCount {
                microcosm_id,
                delta,
            } => {
                let result = sqlx::query(
                    "UPDATE microcosms SET item_count = item_count + $2, last_activity = now() \
                     WHERE id = $1",
                )
                .bind(microcosm_id)
                .bind(delta)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
                ensure_affected(result.rows_affected())?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::UpsertReaction {
                item,
                profile_id,
                item_profile_id,
                created,
                value,
            } => {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO ymg (item_type_id, item_id, profile_id, item_profile_id, created, value)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (item_type_id, item_id, profile_id)
                    DO UPDATE SET value = EXCLUDED.value, created = EXCLUDED.created
                    RETURNING id
                    "#,
                )
                .bind(item.item_type.id())
                .bind(item.item_id)
                .bind(profile_id)
                .bind(item_profile_id)
                .bind(created)
                .bind(value.stored())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;

                Ok(StatementOutcome::Inserted { id })
            }
            Statement::DeleteReaction { item, profile_id } => {
                let result = sqlx::query(
                    "DELETE FROM ymg WHERE item_type_id = $1 AND item_id = $2 AND profile_id = $3",
                )
                .bind(item.item_type.id())
                .bind(item.item_id)
                .bind(profile_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::UpdateWatcher {
                id,
                send_email,
                send_sms,
            } => {
                let result = sqlx::query(
                    "UPDATE watchers SET send_email = $2, send_sms = $3 WHERE id = $1",
                )
                .bind(id)
                .bind(send_email)
                .bind(send_sms)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
                ensure_affected(result.rows_affected())?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::DeleteWatcher { id } => {
                let result = sqlx::query("DELETE FROM watchers WHERE id = $1")
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;
                ensure_affected(result.rows_affected())?;

                Ok(StatementOutcome::Affected {
                    rows: result.rows_affected(),
                })
            }
            Statement::MarkRead {
                site_id,
                profile_id,
                scope,
                read_at,
            } => self.mark_read(*site_id, *profile_id, *scope, *read_at).await,
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

impl PgStoreTransaction {
    async fn insert_question(&mut self, row: &NewQuestionRow) -> Result<StatementOutcome, RepoError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO questions (
                site_id, microcosm_id, title, created, created_by, view_count,
                is_sticky, is_open, is_deleted, is_moderated, is_visible, accepted_answer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(row.site_id)
        .bind(row.microcosm_id)
        .bind(&row.title)
        .bind(row.created)
        .bind(row.created_by)
        .bind(row.view_count)
        .bind(row.flags.sticky)
        .bind(row.flags.open)
        .bind(row.flags.deleted)
        .bind(row.flags.moderated)
        .bind(row.flags.visible)
        .bind(row.accepted_answer_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO flags (
                item_type_id, item_id, site_id, microcosm_id, created_by, last_modified,
                item_is_sticky, item_is_deleted, item_is_moderated,
                microcosm_is_deleted, microcosm_is_moderated, is_visible
            )
            SELECT $1, $2, $3, m.id, $5, $6, $7, $8, $9, m.is_deleted, m.is_moderated, $10
            FROM microcosms m
            WHERE m.id = $4
            "#,
        )
        .bind(ItemType::Question.id())
        .bind(id)
        .bind(row.site_id)
        .bind(row.microcosm_id)
        .bind(row.created_by)
        .bind(row.created)
        .bind(row.flags.sticky)
        .bind(row.flags.deleted)
        .bind(row.flags.moderated)
        .bind(row.flags.visible)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(StatementOutcome::Inserted { id })
    }

    async fn mark_read(
        &mut self,
        site_id: i64,
        profile_id: i64,
        scope: ReadScope,
        read_at: OffsetDateTime,
    ) -> Result<StatementOutcome, RepoError> {
        let superseded = match scope {
            ReadScope::Site => sqlx::query("DELETE FROM read_markers WHERE profile_id = $1")
                .bind(profile_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected(),
            ReadScope::Microcosm(microcosm_id) => sqlx::query(
                r#"
                DELETE FROM read_markers r
                USING flags f
                WHERE r.profile_id = $1
                  AND r.item_type_id = f.item_type_id
                  AND r.item_id = f.item_id
                  AND f.microcosm_id = $2
                "#,
            )
            .bind(profile_id)
            .bind(microcosm_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected(),
            ReadScope::Item(_) => 0,
        };

        let marker = scope.marker(site_id);
        sqlx::query(
            r#"
            INSERT INTO read_markers (profile_id, item_type_id, item_id, read_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (profile_id, item_type_id, item_id)
            DO UPDATE SET read_at = EXCLUDED.read_at
            "#,
        )
        .bind(profile_id)
        .bind(marker.item_type.id())
        .bind(marker.item_id)
        .bind(read_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(StatementOutcome::Affected {
            rows: superseded + 1,
        })
    }
}

fn ensure_affected(rows: u64) -> Result<(), RepoError> {
    if rows == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}
