use axum::Json;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;

use crate::application::error::AppError;
use crate::domain::actor::Actor;
use crate::infra::http::api::state::ApiState;

pub async fn microcosm_tree(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let tree = state.services.microcosms.tree(&actor).await?;
    Ok(Json(tree))
}
