use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::repos::RepoError, cache::CacheError, domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Stable machine-readable error codes.
pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const FORBIDDEN: &str = "forbidden";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const CONFLICT: &str = "conflict";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    NotFound {
        message: String,
        hint: Option<String>,
    },
    #[error("forbidden: {message}")]
    Forbidden { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            hint: None,
        }
    }

    pub fn not_found_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => codes::NOT_FOUND,
            AppError::Forbidden { .. } => codes::FORBIDDEN,
            AppError::InvalidInput { .. } => codes::INVALID_INPUT,
            AppError::Conflict { .. } => codes::CONFLICT,
            AppError::Internal { .. } | AppError::Infra(_) => codes::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } | AppError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller. Internal detail stays in the report.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound { message, .. }
            | AppError::Forbidden { message }
            | AppError::InvalidInput { message }
            | AppError::Conflict { message } => message.clone(),
            AppError::Internal { .. } | AppError::Infra(_) => {
                "Unexpected error occurred".to_string()
            }
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            AppError::NotFound { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { message } => Self::InvalidInput { message },
            DomainError::Invariant { message } => Self::Internal { message },
        }
    }
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound => Self::not_found("resource not found"),
            RepoError::InvalidInput { message } => Self::InvalidInput { message },
            RepoError::Duplicate { constraint } => {
                Self::conflict(format!("duplicate record violates `{constraint}`"))
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(error: CacheError) -> Self {
        Self::internal(error.to_string())
    }
}
