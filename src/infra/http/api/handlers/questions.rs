//! Question handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::AppError;
use crate::domain::actor::Actor;
use crate::domain::questions::PatchOperation;
use crate::infra::http::api::error::{json_rejection, path_rejection, query_rejection};
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn list_questions(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(query_rejection)?;

    let page = state
        .services
        .questions
        .get_page(&actor, query.limit, query.offset)
        .await?;

    Ok(Json(page))
}

pub async fn create_question(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<QuestionCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(json_rejection)?;

    let question = state
        .services
        .questions
        .insert(&actor, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn import_question(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<QuestionImportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(json_rejection)?;

    let question = state
        .services
        .questions
        .import(&actor, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_question(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    let question = state.services.questions.get(&actor, id).await?;
    Ok(Json(question))
}

pub async fn get_question_summary(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    let summary = state.services.questions.get_summary(&actor, id).await?;
    Ok(Json(summary))
}

pub async fn update_question(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<QuestionUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(payload) = payload.map_err(json_rejection)?;

    let question = state
        .services
        .questions
        .update(&actor, payload.into_edit(id))
        .await?;

    Ok(Json(question))
}

pub async fn patch_question(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Vec<PatchOperation>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(operations) = payload.map_err(json_rejection)?;

    state
        .services
        .questions
        .patch(&actor, id, &operations)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_question(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    state.services.questions.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
