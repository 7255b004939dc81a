use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{AppError, ErrorReport};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code().to_string(),
                message: self.public_message(),
                hint: self.hint().map(str::to_string),
            },
        };
        let mut response = (status, Json(body)).into_response();
        // The full chain goes to the logging middleware, never to the caller.
        ErrorReport::from_error("infra::http::api", status, &self).attach(&mut response);
        response
    }
}

pub fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::invalid_input(format!("malformed request body: {}", rejection.body_text()))
}

pub fn path_rejection(rejection: PathRejection) -> AppError {
    AppError::invalid_input(format!("malformed path: {}", rejection.body_text()))
}

pub fn query_rejection(rejection: QueryRejection) -> AppError {
    AppError::invalid_input(format!("malformed query: {}", rejection.body_text()))
}
