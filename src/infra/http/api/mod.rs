pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post, put},
};

use crate::infra::http::middleware::log_responses;

pub fn build_api_router(state: ApiState) -> Router {
    let identity_state = state.clone();

    Router::new()
        .route(
            "/api/v1/questions",
            get(handlers::list_questions).post(handlers::create_question),
        )
        .route("/api/v1/questions/import", post(handlers::import_question))
        .route(
            "/api/v1/questions/{id}",
            get(handlers::get_question)
                .put(handlers::update_question)
                .patch(handlers::patch_question)
                .delete(handlers::delete_question),
        )
        .route(
            "/api/v1/questions/{id}/summary",
            get(handlers::get_question_summary),
        )
        .route("/api/v1/permissions", get(handlers::get_permissions))
        .route(
            "/api/v1/reactions/{item_type}/{item_id}",
            get(handlers::get_reaction)
                .put(handlers::set_reaction)
                .delete(handlers::clear_reaction),
        )
        .route("/api/v1/microcosms/tree", get(handlers::microcosm_tree))
        .route(
            "/api/v1/watchers",
            patch(handlers::update_watcher).delete(handlers::delete_watcher_for_item),
        )
        .route(
            "/api/v1/watchers/{id}",
            get(handlers::get_watcher).delete(handlers::delete_watcher),
        )
        .route("/api/v1/profiles/read", put(handlers::mark_read))
        .route("/api/v1/whoami", get(handlers::whoami))
        .route("/api/v1/health/db", get(handlers::db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            identity_state,
            middleware::resolve_identity,
        ))
        .layer(axum_middleware::from_fn(log_responses))
}
