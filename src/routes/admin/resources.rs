use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_valid::Valid;
use uuid::Uuid;

use super::error::AdminError;
use crate::{
    AppState,
    models::{CreateResource, ResourceWithRoles, UpdateResource},
    services::{MutationOutcome, ResourceUpdate},
};

/// Create a protected resource. Active resources take effect immediately.
#[tracing::instrument(name = "admin.resources.create", skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreateResource>>,
) -> Result<(StatusCode, Json<MutationOutcome<ResourceWithRoles>>), AdminError> {
    let outcome = state.services.resources.create(input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[tracing::instrument(name = "admin.resources.list", skip(state))]
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceWithRoles>>, AdminError> {
    Ok(Json(state.services.resources.list().await?))
}

#[tracing::instrument(name = "admin.resources.get", skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceWithRoles>, AdminError> {
    Ok(Json(state.services.resources.get(id).await?))
}

#[tracing::instrument(name = "admin.resources.update", skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateResource>>,
) -> Result<Json<MutationOutcome<ResourceUpdate>>, AdminError> {
    Ok(Json(state.services.resources.update(id, input).await?))
}

#[tracing::instrument(name = "admin.resources.delete", skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationOutcome<ResourceWithRoles>>, AdminError> {
    Ok(Json(state.services.resources.delete(id).await?))
}
