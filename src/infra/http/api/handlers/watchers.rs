use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::AppError;
use crate::domain::actor::Actor;
use crate::infra::http::api::error::{json_rejection, path_rejection, query_rejection};
use crate::infra::http::api::models::{ItemQuery, WatcherUpdateRequest};
use crate::infra::http::api::state::ApiState;

pub async fn get_watcher(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    let watcher = state.services.watchers.get(&actor, id).await?;
    Ok(Json(watcher))
}

/// Locate the caller's watcher by the watched item and change its delivery.
pub async fn update_watcher(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<WatcherUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(json_rejection)?;
    let preferences = payload.into_preferences()?;

    let watcher = state.services.watchers.update(&actor, preferences).await?;
    Ok(Json(watcher))
}

pub async fn delete_watcher(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    state.services.watchers.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_watcher_for_item(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<ItemQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(query_rejection)?;
    let item = query.item()?;

    state.services.watchers.delete_for_item(&actor, item).await?;
    Ok(StatusCode::NO_CONTENT)
}
