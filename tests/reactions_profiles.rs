mod common;

use common::{Harness, SITE};
use microcosm::application::error::AppError;
use microcosm::domain::actor::Actor;
use microcosm::domain::questions::QuestionDraft;
use microcosm::domain::reactions::{ReactionChoice, ReactionValue};
use microcosm::domain::types::ItemRef;

async fn seed_question(h: &Harness) -> ItemRef {
    let view = h
        .services
        .questions
        .insert(
            &h.member,
            QuestionDraft {
                microcosm_id: h.forum,
                title: "Seed".to_string(),
            },
        )
        .await
        .expect("seed question");
    ItemRef::question(view.record.id)
}

fn yay() -> ReactionChoice {
    ReactionChoice {
        yay: true,
        ..ReactionChoice::default()
    }
}

#[tokio::test]
async fn whoami_requires_a_good_token_and_a_profile() {
    let h = Harness::new().await;
    let profiles = &h.services.profiles;

    let me = profiles.whoami(&h.member).await.expect("whoami");
    assert_eq!(me.profile.id, h.member.profile_id);
    assert!(me.permissions.is_owner);

    let bad_token = Actor::member(SITE, h.member.profile_id, -1);
    let err = profiles.whoami(&bad_token).await.expect_err("bad token");
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = profiles
        .whoami(&Actor::anonymous(SITE))
        .await
        .expect_err("anonymous");
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = profiles
        .whoami(&Actor::member(SITE, 4_242, 77))
        .await
        .expect_err("no profile");
    assert!(matches!(err, AppError::NotFound { .. }));
    assert!(err.hint().is_some());
}

#[tokio::test]
async fn reaction_replaces_previous_choice() {
    let h = Harness::new().await;
    let item = seed_question(&h).await;
    let reactions = &h.services.reactions;

    let first = reactions.set(&h.other_member, item, yay()).await.expect("yay");
    assert_eq!(first.value, ReactionValue::Yay);
    assert_eq!(first.item_profile_id, h.member.profile_id);

    let grr = ReactionChoice {
        grr: true,
        ..ReactionChoice::default()
    };
    let second = reactions.set(&h.other_member, item, grr).await.expect("grr");
    assert_eq!(second.id, first.id);
    assert_eq!(second.value, ReactionValue::Grr);

    let current = reactions.get(&h.other_member, item).await.expect("get");
    assert_eq!(current.value, ReactionValue::Grr);
}

#[tokio::test]
async fn reaction_choice_must_be_exactly_one() {
    let h = Harness::new().await;
    let item = seed_question(&h).await;

    for choice in [
        ReactionChoice::default(),
        ReactionChoice {
            yay: true,
            meh: true,
            grr: false,
        },
    ] {
        let err = h
            .services
            .reactions
            .set(&h.other_member, item, choice)
            .await
            .expect_err("ambiguous choice");
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }
}

#[tokio::test]
async fn clearing_is_idempotent() {
    let h = Harness::new().await;
    let item = seed_question(&h).await;
    let reactions = &h.services.reactions;

    reactions
        .clear(&h.other_member, item)
        .await
        .expect("nothing to clear");

    reactions.set(&h.other_member, item, yay()).await.expect("set");
    reactions.clear(&h.other_member, item).await.expect("clear");
    let err = reactions
        .get(&h.other_member, item)
        .await
        .expect_err("cleared");
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn corrupt_stored_value_is_internal() {
    let h = Harness::new().await;
    let item = seed_question(&h).await;

    h.store
        .put_raw_reaction(item, h.other_member.profile_id, 5)
        .await;
    let err = h
        .services
        .reactions
        .get(&h.other_member, item)
        .await
        .expect_err("unknown stored value");
    assert!(matches!(err, AppError::Internal { .. }));
}

#[tokio::test]
async fn reactions_need_an_authenticated_reader() {
    let h = Harness::new().await;
    let item = seed_question(&h).await;
    let reactions = &h.services.reactions;

    let err = reactions
        .set(&Actor::anonymous(SITE), item, yay())
        .await
        .expect_err("guest");
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = reactions
        .set(&h.other_member, ItemRef::question(9_999), yay())
        .await
        .expect_err("missing item");
    assert!(matches!(err, AppError::NotFound { .. }));
}
