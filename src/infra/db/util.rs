use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

/// Postgres `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";
/// Postgres `invalid_text_representation`.
const INVALID_TEXT: &str = "22P02";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut => return RepoError::Timeout,
        sqlx::Error::Database(db) => db,
        other => return RepoError::from_persistence(other),
    };

    let message = db.message().to_string();
    match db.kind() {
        ErrorKind::UniqueViolation => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        ErrorKind::ForeignKeyViolation => RepoError::InvalidInput { message },
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
            RepoError::Integrity { message }
        }
        _ => match db.code().as_deref() {
            Some(QUERY_CANCELED) => RepoError::Timeout,
            Some(INVALID_TEXT) => RepoError::InvalidInput { message },
            _ => RepoError::from_persistence(message),
        },
    }
}
