use thiserror::Error;

use super::password::PasswordError;
use crate::{db::DbError, idp::IdpError};

/// Errors returned by the administration services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    MalformedInput(String),

    /// The identity provider failed and nothing was changed locally.
    #[error("Identity provider unavailable: {0}")]
    Upstream(#[from] IdpError),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for ServiceError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooLong => Self::MalformedInput(e.to_string()),
            PasswordError::Hash(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => Self::NotFound("Record".to_string()),
            DbError::Conflict(msg) => Self::Conflict(msg),
            DbError::Validation(msg) => Self::MalformedInput(msg),
            other => Self::Database(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
