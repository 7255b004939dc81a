use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header::HeaderName},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{application::error::ErrorReport, domain::actor::Actor};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse the caller's request id when it sent a usable one, otherwise mint
/// one, and echo it on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext { request_id };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log every 4xx/5xx with the error chain carried in the [`ErrorReport`].
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    // Identity is resolved inside this layer and travels back on the response.
    let actor = response.extensions().get::<Actor>().copied();
    let site_id = actor.map(|actor| actor.site_id).unwrap_or_default();
    let profile_id = actor.map(|actor| actor.profile_id).unwrap_or_default();

    let report = response.extensions_mut().remove::<ErrorReport>();
    let source = report.as_ref().map_or("unknown", |report| report.source);
    let chain = report.map(|report| report.messages).unwrap_or_default();
    let detail = chain.first().map_or("no diagnostic available", String::as_str);
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        error!(
            target = "microcosm::http::response",
            status = status.as_u16(),
            %method,
            path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            site_id,
            profile_id,
            "request failed"
        );
    } else {
        warn!(
            target = "microcosm::http::response",
            status = status.as_u16(),
            %method,
            path,
            elapsed_ms,
            source,
            detail,
            request_id,
            site_id,
            profile_id,
            "request rejected"
        );
    }

    response
}
