use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::infra::http::api::state::ApiState;

/// 204 when the store answers, 503 otherwise. The cause goes to the log only.
pub async fn db_health(State(state): State<ApiState>) -> Response {
    match state.services.store.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let status = StatusCode::SERVICE_UNAVAILABLE;
            let mut response = status.into_response();
            ErrorReport::from_error("infra::http::api::health", status, &err).attach(&mut response);
            response
        }
    }
}
