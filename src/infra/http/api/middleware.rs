use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::application::error::AppError;
use crate::config::SiteSettings;
use crate::domain::actor::Actor;

use super::state::ApiState;

pub const SITE_ID_HEADER: &str = "x-site-id";
pub const PROFILE_ID_HEADER: &str = "x-profile-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build the request [`Actor`] from the headers set by the upstream auth proxy.
pub async fn resolve_identity(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let actor = match actor_from_headers(request.headers(), &state.site) {
        Ok(actor) => actor,
        Err(err) => return err.into_response(),
    };

    debug!(
        target = "microcosm::http::identity",
        site_id = actor.site_id,
        profile_id = actor.profile_id,
        user_id = actor.user_id,
        is_site_owner = actor.is_site_owner,
        "resolved request identity"
    );

    request.extensions_mut().insert(actor);
    let mut response = next.run(request).await;
    response.extensions_mut().insert(actor);
    response
}

pub fn actor_from_headers(headers: &HeaderMap, site: &SiteSettings) -> Result<Actor, AppError> {
    let site_id = header_i64(headers, SITE_ID_HEADER)?.unwrap_or(site.default_site_id);
    if site_id <= 0 {
        return Err(AppError::invalid_input(format!(
            "{SITE_ID_HEADER} must be greater than zero"
        )));
    }

    let profile_id = header_i64(headers, PROFILE_ID_HEADER)?.unwrap_or(0);
    if profile_id < 0 {
        return Err(AppError::invalid_input(format!(
            "{PROFILE_ID_HEADER} cannot be negative"
        )));
    }
    let user_id = header_i64(headers, USER_ID_HEADER)?.unwrap_or(0);

    let actor = if user_id > 0 && site.is_owner(site_id, profile_id) {
        Actor::site_owner(site_id, profile_id, user_id)
    } else {
        Actor::member(site_id, profile_id, user_id)
    };
    Ok(actor)
}

fn header_i64(headers: &HeaderMap, name: &'static str) -> Result<Option<i64>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| AppError::invalid_input(format!("{name} must be an integer")))
}
