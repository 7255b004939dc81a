use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::AppError;
use crate::application::permissions::PermissionTarget;
use crate::domain::actor::Actor;
use crate::domain::types::{ItemRef, ItemType};
use crate::infra::http::api::error::{json_rejection, query_rejection};
use crate::infra::http::api::models::{PermissionQuery, ReadScopeRequest};
use crate::infra::http::api::state::ApiState;

pub async fn whoami(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let me = state.services.profiles.whoami(&actor).await?;
    Ok(Json(me))
}

/// Mark an item, a microcosm or the whole site as read for the caller.
pub async fn mark_read(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<ReadScopeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(json_rejection)?;
    let scope = payload.scope()?;

    state.services.reads.mark_read(&actor, scope).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Effective permissions of the caller on an item, or on a new item inside
/// `microcosmId` when `itemId` is 0.
pub async fn get_permissions(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<PermissionQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(query_rejection)?;
    let item_type: ItemType = query.item_type.parse()?;

    let permissions = match (query.item_id, query.microcosm_id) {
        (id, _) if id > 0 => {
            state
                .services
                .permissions
                .resolve_item(&actor, ItemRef::new(item_type, id))
                .await
        }
        (0, Some(container)) if container > 0 => {
            state
                .services
                .permissions
                .resolve(&actor, PermissionTarget::new_item(item_type, container))
                .await
        }
        _ => {
            return Err(AppError::invalid_input(
                "itemId must be positive, or 0 with a positive microcosmId",
            ));
        }
    };

    Ok(Json(permissions))
}
