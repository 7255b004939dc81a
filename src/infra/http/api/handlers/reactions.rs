use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::AppError;
use crate::domain::actor::Actor;
use crate::domain::reactions::ReactionChoice;
use crate::domain::types::{ItemRef, ItemType};
use crate::infra::http::api::error::{json_rejection, path_rejection};
use crate::infra::http::api::models::ReactionResponse;
use crate::infra::http::api::state::ApiState;

fn item_from_path(path: Result<Path<(String, i64)>, PathRejection>) -> Result<ItemRef, AppError> {
    let Path((item_type, item_id)) = path.map_err(path_rejection)?;
    let item_type: ItemType = item_type.parse()?;
    Ok(ItemRef::new(item_type, item_id))
}

pub async fn get_reaction(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let item = item_from_path(path)?;
    let reaction = state.services.reactions.get(&actor, item).await?;
    Ok(Json(ReactionResponse::from(reaction)))
}

pub async fn set_reaction(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<(String, i64)>, PathRejection>,
    payload: Result<Json<ReactionChoice>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let item = item_from_path(path)?;
    let Json(choice) = payload.map_err(json_rejection)?;

    let reaction = state.services.reactions.set(&actor, item, choice).await?;
    Ok(Json(ReactionResponse::from(reaction)))
}

pub async fn clear_reaction(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let item = item_from_path(path)?;
    state.services.reactions.clear(&actor, item).await?;
    Ok(StatusCode::NO_CONTENT)
}
