//! HTTP surface tests: identity headers, status codes and error bodies.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{Harness, SITE};
use microcosm::config::SiteSettings;
use microcosm::domain::actor::Actor;
use microcosm::domain::types::ItemRef;
use microcosm::infra::http::{ApiState, build_router};

fn router(h: &Harness) -> Router {
    build_router(ApiState::new(
        h.services.clone(),
        SiteSettings {
            default_site_id: SITE,
            owners: vec![(SITE, h.owner.profile_id)],
        },
    ))
}

fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header("x-site-id", actor.site_id.to_string())
            .header("x-profile-id", actor.profile_id.to_string())
            .header("x-user-id", actor.user_id.to_string());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

#[tokio::test]
async fn create_retry_and_list() {
    let h = Harness::new().await;
    let app = router(&h);
    let payload = json!({ "microcosmId": h.forum, "title": "Which runtime?" });

    let (status, created) = send(
        &app,
        request("POST", "/api/v1/questions", Some(&h.member), Some(payload.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Which runtime?");
    assert_eq!(created["author"]["name"], "ada");
    assert_eq!(created["flags"]["open"], true);

    let (status, retried) = send(
        &app,
        request("POST", "/api/v1/questions", Some(&h.member), Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(retried["id"], created["id"]);

    let (status, page) = send(&app, request("GET", "/api/v1/questions?limit=10", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], created["id"]);
}

#[tokio::test]
async fn patch_then_read_back() {
    let h = Harness::new().await;
    let app = router(&h);

    let (_, created) = send(
        &app,
        request(
            "POST",
            "/api/v1/questions",
            Some(&h.member),
            Some(json!({ "microcosm_id": h.forum, "title": "Pin me" })),
        ),
    )
    .await;
    let uri = format!("/api/v1/questions/{}", created["id"]);

    let ops = json!([{ "op": "replace", "path": "/meta/flags/sticky", "value": true }]);
    let (status, body) = send(&app, request("PATCH", &uri, Some(&h.moderator), Some(ops.clone()))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, again) = send(&app, request("PATCH", &uri, Some(&h.moderator), Some(ops))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"]["code"], "conflict");

    let (status, question) = send(&app, request("GET", &uri, Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(question["flags"]["sticky"], true);
}

#[tokio::test]
async fn update_and_delete_over_http() {
    let h = Harness::new().await;
    let app = router(&h);

    let (_, created) = send(
        &app,
        request(
            "POST",
            "/api/v1/questions",
            Some(&h.member),
            Some(json!({ "microcosmId": h.forum, "title": "Draft title" })),
        ),
    )
    .await;
    let uri = format!("/api/v1/questions/{}", created["id"]);

    let (status, updated) = send(
        &app,
        request(
            "PUT",
            &uri,
            Some(&h.member),
            Some(json!({
                "microcosmId": h.forum,
                "title": "Final title",
                "editReason": "clarity"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Final title");
    assert_eq!(updated["edit_reason"], "clarity");

    let (status, _) = send(&app, request("DELETE", &uri, Some(&h.other_member), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, request("DELETE", &uri, Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, request("GET", &uri, Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let h = Harness::new().await;
    let app = router(&h);

    let bad_header = Request::builder()
        .uri("/api/v1/questions")
        .header("x-site-id", "abc")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&app, bad_header).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");

    let bad_json = Request::builder()
        .method("POST")
        .uri("/api/v1/questions")
        .header("x-profile-id", h.member.profile_id.to_string())
        .header("x-user-id", h.member.user_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .expect("request");
    let (status, body) = send(&app, bad_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");

    let (status, _) = send(&app, request("GET", "/api/v1/questions/abc", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, request("GET", "/api/v1/questions?offset=3", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guests_cannot_post() {
    let h = Harness::new().await;
    let app = router(&h);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/questions",
            None,
            Some(json!({ "microcosmId": h.forum, "title": "Hello" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn import_is_limited_to_configured_owners() {
    let h = Harness::new().await;
    let app = router(&h);
    let payload = json!({
        "microcosmId": h.forum,
        "title": "From the old forum",
        "created": "2015-03-01T12:00:00Z",
        "createdBy": h.member.profile_id,
        "viewCount": 7
    });

    let (status, _) = send(
        &app,
        request("POST", "/api/v1/questions/import", Some(&h.member), Some(payload.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner status comes from configuration, not from the caller.
    let (status, imported) = send(
        &app,
        request("POST", "/api/v1/questions/import", Some(&h.owner), Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(imported["view_count"], 7);
    assert_eq!(imported["created"], "2015-03-01T12:00:00Z");
}

#[tokio::test]
async fn whoami_reports_profile_and_errors() {
    let h = Harness::new().await;
    let app = router(&h);

    let (status, me) = send(&app, request("GET", "/api/v1/whoami", Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "ada");
    assert_eq!(me["permissions"]["isOwner"], true);

    let (status, _) = send(&app, request("GET", "/api/v1/whoami", None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let ghost = Actor::member(SITE, 999, 500);
    let (status, body) = send(&app, request("GET", "/api/v1/whoami", Some(&ghost), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["hint"].is_string());
}

#[tokio::test]
async fn reactions_round_trip_over_http() {
    let h = Harness::new().await;
    let app = router(&h);

    let (_, created) = send(
        &app,
        request(
            "POST",
            "/api/v1/questions",
            Some(&h.member),
            Some(json!({ "microcosmId": h.forum, "title": "React to me" })),
        ),
    )
    .await;
    let uri = format!("/api/v1/reactions/question/{}", created["id"]);

    let (status, _) = send(&app, request("GET", &uri, Some(&h.other_member), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, reaction) = send(
        &app,
        request("PUT", &uri, Some(&h.other_member), Some(json!({ "meh": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reaction["meh"], true);
    assert_eq!(reaction["yay"], false);
    assert_eq!(reaction["item_profile_id"], h.member.profile_id);

    let (status, _) = send(
        &app,
        request("PUT", &uri, Some(&h.other_member), Some(json!({ "yay": true, "grr": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, request("DELETE", &uri, Some(&h.other_member), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", &uri, Some(&h.other_member), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        request("GET", "/api/v1/reactions/widget/1", Some(&h.other_member), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn permissions_endpoint_covers_new_and_existing_items() {
    let h = Harness::new().await;
    let app = router(&h);

    let uri = format!(
        "/api/v1/permissions?itemType=question&itemId=0&microcosmId={}",
        h.forum
    );
    let (status, set) = send(&app, request("GET", &uri, Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(set["canCreate"], true);
    assert_eq!(set["canModerate"], false);

    let (status, set) = send(&app, request("GET", &uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(set["canCreate"], false);
    assert_eq!(set["isGuest"], true);

    let (status, _) = send(
        &app,
        request("GET", "/api/v1/permissions?itemType=question", Some(&h.member), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_check_is_no_content() {
    let h = Harness::new().await;
    let app = router(&h);

    let (status, body) = send(&app, request("GET", "/api/v1/health/db", None, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn watcher_endpoints_update_and_delete() {
    let h = Harness::new().await;
    let app = router(&h);
    let (_, created) = send(
        &app,
        request(
            "POST",
            "/api/v1/questions",
            Some(&h.member),
            Some(json!({ "microcosmId": h.forum, "title": "Watch me" })),
        ),
    )
    .await;
    let question_id = created["id"].as_i64().expect("question id");
    let watcher_id = h
        .store
        .add_watcher(SITE, h.member.profile_id, ItemRef::question(question_id), false)
        .await;

    let (status, watcher) = send(
        &app,
        request(
            "PATCH",
            "/api/v1/watchers",
            Some(&h.member),
            Some(json!({
                "itemType": "question",
                "itemId": question_id,
                "sendEmail": true,
                "sendSMS": false,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(watcher["id"], watcher_id);
    assert_eq!(watcher["send_email"], true);

    let uri = format!("/api/v1/watchers/{watcher_id}");
    let (status, _) = send(&app, request("DELETE", &uri, Some(&h.other_member), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, request("DELETE", &uri, Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, request("GET", &uri, Some(&h.member), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/v1/watchers?itemType=question&itemId={question_id}"),
            Some(&h.member),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_read_validates_scope_and_caller() {
    let h = Harness::new().await;
    let app = router(&h);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            "/api/v1/profiles/read",
            Some(&h.member),
            Some(json!({ "itemType": "microcosm", "itemId": h.forum })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(h.store.read_marker_count(h.member.profile_id).await, 1);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            "/api/v1/profiles/read",
            Some(&h.member),
            Some(json!({ "itemType": "widget", "itemId": 1 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            "/api/v1/profiles/read",
            None,
            Some(json!({ "itemType": "site" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn microcosm_tree_nests_children() {
    let h = Harness::new().await;
    let child = h.add_microcosm(Some(h.forum), "Off topic").await;
    let app = router(&h);

    let (status, tree) = send(
        &app,
        request("GET", "/api/v1/microcosms/tree", Some(&h.member), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree[0]["id"], h.forum);
    assert_eq!(tree[0]["children"][0]["id"], child);
    assert_eq!(tree[0]["children"][0]["title"], "Off topic");
}
