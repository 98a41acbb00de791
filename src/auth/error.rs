use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api_types::ErrorResponse;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Identity header absent where one is required.
    #[error("Identity header required")]
    MissingIdentity,

    /// A trusted header carried bytes that are not visible ASCII.
    #[error("Invalid {0} header encoding")]
    InvalidHeader(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingIdentity => (StatusCode::UNAUTHORIZED, "missing_identity"),
            AuthError::InvalidHeader(_) => (StatusCode::BAD_REQUEST, "invalid_identity_header"),
        };
        let body = ErrorResponse::with_code("authentication_error", code, self.to_string());
        (status, Json(body)).into_response()
    }
}
