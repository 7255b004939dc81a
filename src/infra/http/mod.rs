//! HTTP surface: the versioned JSON API wrapped in request context.

pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use axum::Router;

/// Full application router: every API route plus request-id propagation.
pub fn build_router(state: ApiState) -> Router {
    build_api_router(state).layer(axum::middleware::from_fn(
        middleware::set_request_context,
    ))
}
