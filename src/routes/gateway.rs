use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{AppState, api_types::ErrorResponse};

/// Fallback for every path not served locally: forward it downstream.
///
/// Runs after the enforcement point, so only granted requests get here.
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    if !state.config.gateway.enabled {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("not_found", "Not found")),
        )
            .into_response();
    }
    state.proxy.forward(request).await
}
