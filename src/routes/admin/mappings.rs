use axum::{Json, extract::State};
use serde::Serialize;

use super::error::AdminError;
use crate::{
    AppState,
    authz::{Mapping, MappingStore},
};

/// Current registry contents, in evaluation order.
#[tracing::instrument(name = "admin.mappings.list", skip(state))]
pub async fn list(State(state): State<AppState>) -> Json<Vec<Mapping>> {
    let snapshot = state.registry.snapshot();
    Json(snapshot.iter().map(|entry| entry.mapping().clone()).collect())
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub mappings: usize,
}

/// Rebuild the registry from seed mappings and the resource store.
#[tracing::instrument(name = "admin.mappings.reload", skip(state))]
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AdminError> {
    let mappings = state.services.resources.reload_registry().await?;
    Ok(Json(ReloadResponse { mappings }))
}
