use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{IdPage, QuestionListQuery, QuestionsRepo, RepoError},
    domain::flags::ItemFlags,
    domain::questions::{QuestionRecord, QuestionSummaryRecord},
    domain::types::ItemType,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    site_id: i64,
    microcosm_id: i64,
    title: String,
    created: OffsetDateTime,
    created_by: i64,
    edited: Option<OffsetDateTime>,
    edited_by: Option<i64>,
    edit_reason: Option<String>,
    is_sticky: bool,
    is_open: bool,
    is_deleted: bool,
    is_moderated: bool,
    is_visible: bool,
    view_count: i64,
    accepted_answer_id: Option<i64>,
}

impl From<QuestionRow> for QuestionRecord {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            microcosm_id: row.microcosm_id,
            title: row.title,
            created: row.created,
            created_by: row.created_by,
            edited: row.edited,
            edited_by: row.edited_by,
            edit_reason: row.edit_reason,
            flags: ItemFlags {
                sticky: row.is_sticky,
                open: row.is_open,
                deleted: row.is_deleted,
                moderated: row.is_moderated,
                visible: row.is_visible,
            },
            view_count: row.view_count,
            accepted_answer_id: row.accepted_answer_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionSummaryRow {
    id: i64,
    site_id: i64,
    microcosm_id: i64,
    title: String,
    created: OffsetDateTime,
    created_by: i64,
    is_sticky: bool,
    is_open: bool,
    is_deleted: bool,
    is_moderated: bool,
    is_visible: bool,
    view_count: i64,
    comment_count: i64,
    accepted_answer_id: Option<i64>,
    last_activity: Option<OffsetDateTime>,
}

impl From<QuestionSummaryRow> for QuestionSummaryRecord {
    fn from(row: QuestionSummaryRow) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            microcosm_id: row.microcosm_id,
            title: row.title,
            created: row.created,
            created_by: row.created_by,
            flags: ItemFlags {
                sticky: row.is_sticky,
                open: row.is_open,
                deleted: row.is_deleted,
                moderated: row.is_moderated,
                visible: row.is_visible,
            },
            view_count: row.view_count,
            comment_count: row.comment_count,
            accepted_answer_id: row.accepted_answer_id,
            last_activity: row.last_activity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ListedIdRow {
    id: i64,
    total: i64,
}

#[async_trait]
impl QuestionsRepo for PostgresRepositories {
    async fn find_question(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionRecord>, RepoError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, site_id, microcosm_id, title, created, created_by,
                   edited, edited_by, edit_reason,
                   is_sticky, is_open, is_deleted, is_moderated, is_visible,
                   view_count, accepted_answer_id
            FROM questions
            WHERE site_id = $1 AND id = $2 AND NOT is_deleted
            "#,
        )
        .bind(site_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(QuestionRecord::from))
    }

    async fn find_question_summary(
        &self,
        site_id: i64,
        id: i64,
    ) -> Result<Option<QuestionSummaryRecord>, RepoError> {
        let row = sqlx::query_as::<_, QuestionSummaryRow>(
            r#"
            SELECT q.id, q.site_id, q.microcosm_id, q.title, q.created, q.created_by,
                   q.is_sticky, q.is_open, q.is_deleted, q.is_moderated, q.is_visible,
                   q.view_count, q.comment_count, q.accepted_answer_id,
                   f.last_modified AS last_activity
            FROM questions q
            LEFT JOIN flags f ON f.item_type_id = $3 AND f.item_id = q.id
            WHERE q.site_id = $1 AND q.id = $2 AND NOT q.is_deleted
            "#,
        )
        .bind(site_id)
        .bind(id)
        .bind(ItemType::Question.id())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(QuestionSummaryRecord::from))
    }

    async fn list_question_ids(&self, query: &QuestionListQuery) -> Result<IdPage, RepoError> {
        // The grant subquery mirrors the precedence of `effective_grant`.
        let rows = sqlx::query_as::<_, ListedIdRow>(
            r#"
            SELECT f.item_id AS id, COUNT(*) OVER () AS total
            FROM flags f
            WHERE f.site_id = $1
              AND f.item_type_id = $3
              AND f.is_visible
              AND NOT EXISTS (
                  SELECT 1 FROM ignores_expanded i
                  WHERE i.profile_id = $2
                    AND ((i.item_type_id = f.item_type_id AND i.item_id = f.item_id)
                      OR (i.item_type_id = $4 AND i.item_id = f.microcosm_id))
              )
              AND ($5 OR COALESCE((
                  SELECT CASE WHEN $2 = 0 THEN g.guest_can_read ELSE g.can_read END
                  FROM permission_grants g
                  WHERE g.site_id = f.site_id
                    AND g.microcosm_id IN (f.microcosm_id, 0)
                    AND g.profile_id IN ($2, 0)
                  ORDER BY g.microcosm_id DESC, g.profile_id DESC
                  LIMIT 1
              ), FALSE))
            ORDER BY f.item_is_sticky DESC, f.last_modified DESC, f.item_id DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(query.site_id)
        .bind(query.profile_id)
        .bind(ItemType::Question.id())
        .bind(ItemType::Microcosm.id())
        .bind(query.is_site_owner)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let total = rows.first().map(|row| row.total).unwrap_or_default();
        Ok(IdPage {
            ids: rows.into_iter().map(|row| row.id).collect(),
            total,
        })
    }
}
