//! End-to-end question flows over the in-memory store: create, retry,
//! moderate, and read back through the result cache.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{Harness, SITE};
use microcosm::application::error::AppError;
use microcosm::application::permissions::PermissionTarget;
use microcosm::cache::CacheKey;
use microcosm::domain::actor::Actor;
use microcosm::domain::flags::{ItemFlags, LevelFlags};
use microcosm::domain::questions::{
    ImportedQuestion, PatchOperation, QuestionDraft, QuestionEdit, QuestionRecord,
};
use microcosm::domain::types::{ItemRef, ItemType};
use time::OffsetDateTime;

fn draft(microcosm_id: i64, title: &str) -> QuestionDraft {
    QuestionDraft {
        microcosm_id,
        title: title.to_string(),
    }
}

fn replace(flag: &str, value: bool) -> PatchOperation {
    PatchOperation {
        op: "replace".to_string(),
        path: format!("/meta/flags/{flag}"),
        value: json!(value),
    }
}

async fn item_count(harness: &Harness, microcosm_id: i64) -> i64 {
    harness
        .services
        .microcosms
        .summary(SITE, microcosm_id)
        .await
        .expect("microcosm summary")
        .item_count
}

#[tokio::test]
async fn identical_retry_returns_the_first_question() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let first = questions
        .insert(&h.member, draft(h.forum, "How do I  tune the cache?"))
        .await
        .expect("create");
    let retry = questions
        .insert(&h.member, draft(h.forum, "How do I tune the cache?"))
        .await
        .expect("retry");

    assert_eq!(first.record.id, retry.record.id);
    assert_eq!(first.record.title, "How do I tune the cache?");
    assert_eq!(h.store.question_count().await, 1);
    assert_eq!(item_count(&h, h.forum).await, 1);
}

#[tokio::test]
async fn retry_after_the_window_creates_again() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let first = questions
        .insert(&h.member, draft(h.forum, "Same title"))
        .await
        .expect("create");
    h.clock.advance(Duration::from_secs(301));
    let second = questions
        .insert(&h.member, draft(h.forum, "Same title"))
        .await
        .expect("create again");

    assert_ne!(first.record.id, second.record.id);
    assert_eq!(h.store.question_count().await, 2);
}

#[tokio::test]
async fn different_authors_are_not_deduplicated() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let a = questions
        .insert(&h.member, draft(h.forum, "Shared title"))
        .await
        .expect("create");
    let b = questions
        .insert(&h.other_member, draft(h.forum, "Shared title"))
        .await
        .expect("create");

    assert_ne!(a.record.id, b.record.id);
}

#[tokio::test]
async fn failed_insert_does_not_claim_the_fingerprint() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    h.store.fail_statement("adjust_item_count");
    let err = questions
        .insert(&h.member, draft(h.forum, "Will this fail?"))
        .await
        .expect_err("injected failure");
    assert!(matches!(err, AppError::Internal { .. }));
    assert_eq!(h.store.question_count().await, 0);
    assert!(h.dedup.is_empty());

    h.store.clear_failures();
    let created = questions
        .insert(&h.member, draft(h.forum, "Will this fail?"))
        .await
        .expect("create after recovery");
    let retry = questions
        .insert(&h.member, draft(h.forum, "Will this fail?"))
        .await
        .expect("retry");
    assert_eq!(created.record.id, retry.record.id);
    assert_eq!(h.store.question_count().await, 1);
}

#[tokio::test]
async fn insert_validates_after_permission_check() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let anonymous = Actor::anonymous(SITE);
    let err = questions
        .insert(&anonymous, draft(h.forum, "Guest question"))
        .await
        .expect_err("guests cannot post");
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = questions
        .insert(&h.member, draft(h.forum, "   "))
        .await
        .expect_err("blank title");
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let err = questions
        .insert(&h.member, draft(9_999, "Nowhere"))
        .await
        .expect_err("missing microcosm");
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn moderated_question_is_hidden_from_members_only() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Is this allowed?"))
        .await
        .expect("create");
    let id = created.record.id;

    // Prime the cached detail before moderating.
    questions.get(&h.other_member, id).await.expect("visible");

    questions
        .patch(&h.moderator, id, &[replace("moderated", true)])
        .await
        .expect("moderate");

    let err = questions
        .get(&h.other_member, id)
        .await
        .expect_err("hidden from members");
    assert!(matches!(err, AppError::NotFound { .. }));

    let seen = questions.get(&h.moderator, id).await.expect("moderator view");
    assert!(seen.record.flags.moderated);
    assert!(!seen.record.flags.visible);
    questions.get(&h.owner, id).await.expect("site owner view");

    let page = questions
        .get_page(&h.other_member, None, None)
        .await
        .expect("page");
    assert!(page.items.iter().all(|item| item.summary.id != id));

    questions
        .patch(&h.moderator, id, &[replace("moderated", false)])
        .await
        .expect("unmoderate");
    let back = questions.get(&h.other_member, id).await.expect("visible again");
    assert!(back.record.flags.visible);
}

#[tokio::test]
async fn create_in_a_moderated_microcosm_reports_success() {
    let h = Harness::new().await;
    let questions = &h.services.questions;
    h.store
        .set_microcosm_level(h.forum, LevelFlags::new(false, true))
        .await;

    let created = questions
        .insert(&h.member, draft(h.forum, "Hidden place"))
        .await
        .expect("committed create is a success");
    assert!(!created.record.flags.visible);
    assert_eq!(created.author.as_ref().map(|author| author.id), Some(h.member.profile_id));

    let retry = questions
        .insert(&h.member, draft(h.forum, "Hidden place"))
        .await
        .expect("retry is a success");
    assert_eq!(retry.record.id, created.record.id);
    assert_eq!(h.store.question_count().await, 1);

    let err = questions
        .get(&h.other_member, created.record.id)
        .await
        .expect_err("readers still cannot see it");
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn retry_after_moderation_returns_the_hidden_original() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Borderline"))
        .await
        .expect("create");
    questions
        .patch(&h.moderator, created.record.id, &[replace("moderated", true)])
        .await
        .expect("moderate");

    let retry = questions
        .insert(&h.member, draft(h.forum, "Borderline"))
        .await
        .expect("retry is a success");
    assert_eq!(retry.record.id, created.record.id);
    assert!(retry.record.flags.moderated);
    assert_eq!(h.store.question_count().await, 1);
}

#[tokio::test]
async fn retry_after_delete_creates_again() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Short lived"))
        .await
        .expect("create");
    questions
        .delete(&h.member, created.record.id)
        .await
        .expect("delete");

    let again = questions
        .insert(&h.member, draft(h.forum, "Short lived"))
        .await
        .expect("create again");
    assert_ne!(again.record.id, created.record.id);
    assert_eq!(h.store.question_count().await, 2);
}

#[tokio::test]
async fn update_that_lands_in_a_moderated_microcosm_reports_success() {
    let h = Harness::new().await;
    let questions = &h.services.questions;
    let quarantine = h.add_microcosm(None, "Quarantine").await;
    h.store
        .set_microcosm_level(quarantine, LevelFlags::new(false, true))
        .await;

    let created = questions
        .insert(&h.member, draft(h.forum, "Wandering"))
        .await
        .expect("create");
    let moved = questions
        .update(
            &h.member,
            QuestionEdit {
                id: created.record.id,
                microcosm_id: quarantine,
                title: "Wandering".to_string(),
                edit_reason: "wrong place".to_string(),
            },
        )
        .await
        .expect("committed move is a success");
    assert_eq!(moved.record.microcosm_id, quarantine);
    assert!(!moved.record.flags.visible);
}

#[tokio::test]
async fn reads_after_a_mutation_are_never_stale() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "First"))
        .await
        .expect("create");
    let id = created.record.id;

    let before = questions.get(&h.member, id).await.expect("read");
    assert!(!before.record.flags.sticky);
    assert_eq!(item_count(&h, h.forum).await, 1);

    questions
        .patch(&h.moderator, id, &[replace("sticky", true)])
        .await
        .expect("sticky");
    let after = questions.get(&h.member, id).await.expect("read again");
    assert!(after.record.flags.sticky);
    assert_eq!(after.record.edit_reason.as_deref(), Some("Set sticky to true"));

    let summary = questions.get_summary(&h.member, id).await.expect("summary");
    assert!(summary.summary.flags.sticky);

    questions
        .insert(&h.member, draft(h.forum, "Second"))
        .await
        .expect("create second");
    assert_eq!(item_count(&h, h.forum).await, 2);
}

#[tokio::test]
async fn flag_patches_follow_permission_rules() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Patch me"))
        .await
        .expect("create");
    let id = created.record.id;

    let err = questions
        .patch(&h.member, id, &[replace("sticky", true)])
        .await
        .expect_err("authors cannot pin");
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = questions
        .patch(&h.other_member, id, &[replace("open", false)])
        .await
        .expect_err("only the author may close");
    assert!(matches!(err, AppError::Forbidden { .. }));

    questions
        .patch(&h.member, id, &[replace("open", false)])
        .await
        .expect("author closes");
    let closed = questions.get(&h.member, id).await.expect("read");
    assert!(!closed.record.flags.open);

    let err = questions
        .patch(&h.member, id, &[replace("open", false)])
        .await
        .expect_err("already closed");
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn malformed_patches_are_invalid_input() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Patch shapes"))
        .await
        .expect("create");
    let id = created.record.id;

    let err = questions.patch(&h.moderator, id, &[]).await.expect_err("empty");
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let unknown = PatchOperation {
        op: "replace".to_string(),
        path: "/meta/flags/pinned".to_string(),
        value: json!(true),
    };
    let err = questions
        .patch(&h.moderator, id, &[unknown])
        .await
        .expect_err("unknown path");
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let add = PatchOperation {
        op: "add".to_string(),
        path: "/meta/flags/sticky".to_string(),
        value: json!(true),
    };
    let err = questions
        .patch(&h.moderator, id, &[add])
        .await
        .expect_err("unsupported op");
    assert!(matches!(err, AppError::InvalidInput { .. }));
}

#[tokio::test]
async fn delete_hides_the_question_and_decrements_the_count() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Short lived"))
        .await
        .expect("create");
    let id = created.record.id;
    assert_eq!(item_count(&h, h.forum).await, 1);

    let err = questions
        .delete(&h.other_member, id)
        .await
        .expect_err("not the author");
    assert!(matches!(err, AppError::Forbidden { .. }));

    questions.delete(&h.member, id).await.expect("delete");
    assert_eq!(item_count(&h, h.forum).await, 0);

    let err = questions.get(&h.moderator, id).await.expect_err("gone");
    assert!(matches!(err, AppError::NotFound { .. }));

    let stored = h.store.question_record(id).await.expect("soft deleted row");
    assert!(stored.flags.deleted);
    assert!(!stored.flags.visible);
}

#[tokio::test]
async fn moving_a_question_updates_both_containers() {
    let h = Harness::new().await;
    let questions = &h.services.questions;
    let meta = h.add_microcosm(Some(h.forum), "Meta").await;

    let created = questions
        .insert(&h.member, draft(h.forum, "Where does this go?"))
        .await
        .expect("create");
    let id = created.record.id;
    assert_eq!(item_count(&h, h.forum).await, 1);
    assert_eq!(item_count(&h, meta).await, 0);

    let err = questions
        .update(
            &h.member,
            QuestionEdit {
                id,
                microcosm_id: meta,
                title: "Where does this go?".to_string(),
                edit_reason: "  ".to_string(),
            },
        )
        .await
        .expect_err("reason required");
    assert!(matches!(err, AppError::InvalidInput { .. }));

    let moved = questions
        .update(
            &h.member,
            QuestionEdit {
                id,
                microcosm_id: meta,
                title: "Where does this belong?".to_string(),
                edit_reason: "better home".to_string(),
            },
        )
        .await
        .expect("move");

    assert_eq!(moved.record.microcosm_id, meta);
    assert_eq!(moved.record.title, "Where does this belong?");
    assert_eq!(moved.editor.as_ref().map(|p| p.id), Some(h.member.profile_id));
    let crumbs: Vec<_> = moved
        .breadcrumb
        .iter()
        .filter_map(|link| link.title.clone())
        .collect();
    assert_eq!(crumbs, vec!["General".to_string(), "Meta".to_string()]);

    assert_eq!(item_count(&h, h.forum).await, 0);
    assert_eq!(item_count(&h, meta).await, 1);
}

#[tokio::test]
async fn failed_statement_leaves_the_cache_untouched() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Original title"))
        .await
        .expect("create");
    let id = created.record.id;
    questions.get(&h.member, id).await.expect("prime cache");

    h.store.fail_statement("update_question");
    let err = questions
        .update(
            &h.member,
            QuestionEdit {
                id,
                microcosm_id: h.forum,
                title: "Changed title".to_string(),
                edit_reason: "typo".to_string(),
            },
        )
        .await
        .expect_err("injected failure");
    assert!(matches!(err, AppError::Internal { .. }));

    let cached = h
        .cache
        .get::<QuestionRecord>(&CacheKey::detail(ItemRef::question(id)))
        .expect("cached detail survives");
    assert_eq!(cached.title, "Original title");

    let stored = h.store.question_record(id).await.expect("row");
    assert_eq!(stored.title, "Original title");
}

#[tokio::test]
async fn purge_fault_after_commit_is_internal() {
    let h = Harness::new().await;

    h.backend.fail_purges(true);
    let err = h
        .services
        .questions
        .insert(&h.member, draft(h.forum, "Durable but unpurged"))
        .await
        .expect_err("purge fault");
    assert!(matches!(err, AppError::Internal { .. }));
    assert_eq!(err.public_message(), "Unexpected error occurred");

    // The write itself is durable.
    assert_eq!(h.store.question_count().await, 1);
    h.backend.fail_purges(false);
}

#[tokio::test]
async fn pages_are_sticky_first_and_bounded() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let mut ids = Vec::new();
    for title in ["One", "Two", "Three"] {
        let created = questions
            .insert(&h.member, draft(h.forum, title))
            .await
            .expect("create");
        ids.push(created.record.id);
    }
    questions
        .patch(&h.moderator, ids[0], &[replace("sticky", true)])
        .await
        .expect("pin the oldest");

    let first = questions
        .get_page(&h.member, Some(2), Some(0))
        .await
        .expect("first page");
    assert_eq!(first.total, 3);
    assert_eq!(first.pages, 2);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].summary.id, ids[0]);

    let second = questions
        .get_page(&h.member, Some(2), Some(2))
        .await
        .expect("second page");
    assert_eq!(second.items.len(), 1);

    for (limit, offset) in [(Some(2), Some(4)), (Some(2), Some(1)), (Some(0), None), (Some(251), None)] {
        let err = questions
            .get_page(&h.member, limit, offset)
            .await
            .expect_err("out of bounds");
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }
}

#[tokio::test]
async fn ignored_questions_are_not_listed() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Noise"))
        .await
        .expect("create");
    h.store
        .ignore(h.other_member.profile_id, ItemRef::question(created.record.id))
        .await;

    let theirs = questions
        .get_page(&h.other_member, None, None)
        .await
        .expect("page");
    assert_eq!(theirs.total, 0);

    let mine = questions.get_page(&h.member, None, None).await.expect("page");
    assert_eq!(mine.total, 1);
}

#[tokio::test]
async fn import_is_reserved_for_site_owners() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let imported = || ImportedQuestion {
        microcosm_id: h.forum,
        title: "Carried over".to_string(),
        created: OffsetDateTime::UNIX_EPOCH,
        created_by: h.member.profile_id,
        view_count: 42,
        flags: ItemFlags {
            open: true,
            ..ItemFlags::default()
        },
        accepted_answer_id: None,
    };

    let err = questions
        .import(&h.member, imported())
        .await
        .expect_err("members cannot import");
    assert!(matches!(err, AppError::Forbidden { .. }));

    let view = questions.import(&h.owner, imported()).await.expect("import");
    assert_eq!(view.record.view_count, 42);
    assert!(view.record.flags.visible);
    assert_eq!(view.author.map(|p| p.name), Some("ada".to_string()));
    assert_eq!(item_count(&h, h.forum).await, 1);
}

#[tokio::test]
async fn permission_lookups_fail_closed() {
    let h = Harness::new().await;

    h.store.fail_grant_lookups(true);
    let set = h
        .services
        .permissions
        .resolve(
            &h.member,
            PermissionTarget::new_item(ItemType::Question, h.forum),
        )
        .await;
    assert!(!set.can_read && !set.can_create && !set.can_moderate);

    let err = h
        .services
        .questions
        .insert(&h.member, draft(h.forum, "No grant"))
        .await
        .expect_err("lookup failure");
    assert!(matches!(err, AppError::Internal { .. }));
    assert_eq!(h.store.question_count().await, 0);
}

#[tokio::test]
async fn guests_read_but_invalid_ids_are_not_found() {
    let h = Harness::new().await;
    let questions = &h.services.questions;

    let created = questions
        .insert(&h.member, draft(h.forum, "Public"))
        .await
        .expect("create");

    let guest = Actor::anonymous(SITE);
    let view = questions.get(&guest, created.record.id).await.expect("guest read");
    assert_eq!(view.links[0].href, format!("/api/v1/questions/{}", created.record.id));

    let err = questions.get(&guest, 0).await.expect_err("zero id");
    assert!(matches!(err, AppError::NotFound { .. }));
}
