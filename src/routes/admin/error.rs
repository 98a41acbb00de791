use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{api_types::ErrorResponse, db::DbError, services::ServiceError};

#[derive(Debug)]
pub enum AdminError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    /// Identity provider failed on an operation with no local effect.
    Upstream(String),
    Database(DbError),
    Internal(String),
}

impl From<DbError> for AdminError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AdminError::NotFound("Resource not found".to_string()),
            DbError::Conflict(msg) => AdminError::Conflict(msg),
            DbError::Validation(msg) => AdminError::Validation(msg),
            _ => AdminError::Database(err),
        }
    }
}

impl From<ServiceError> for AdminError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => AdminError::NotFound(err.to_string()),
            ServiceError::Conflict(msg) => AdminError::Conflict(msg),
            ServiceError::MalformedInput(msg) => AdminError::Validation(msg),
            ServiceError::Upstream(e) => AdminError::Upstream(e.to_string()),
            ServiceError::Database(e) => AdminError::from(e),
            ServiceError::Internal(msg) => AdminError::Internal(msg),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code, message, error_type) = match self {
            AdminError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, "not_found"),
            AdminError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, "conflict"),
            AdminError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg,
                "validation_error",
            ),
            AdminError::Upstream(msg) => {
                tracing::error!(error = %msg, "Identity provider unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "identity_provider_unavailable",
                    "The identity provider could not be reached".to_string(),
                    "upstream_error",
                )
            }
            AdminError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "An internal database error occurred".to_string(),
                    "internal_error",
                )
            }
            AdminError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    "internal_error",
                )
            }
        };

        (
            status,
            Json(ErrorResponse::with_code(error_type, code, message)),
        )
            .into_response()
    }
}
