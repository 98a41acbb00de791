//! Health check endpoints for Kubernetes probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always "healthy" when the process can answer.
    pub status: &'static str,
    pub version: &'static str,
    /// Number of mappings currently enforced.
    pub mappings: usize,
    pub identity_provider: IdpStatus,
}

#[derive(Debug, Serialize)]
pub struct IdpStatus {
    pub enabled: bool,
}

#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        mappings: state.registry.len(),
        identity_provider: IdpStatus {
            enabled: state.idp.is_enabled(),
        },
    })
}

/// Kubernetes liveness probe.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}
