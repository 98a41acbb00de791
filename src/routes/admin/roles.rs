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
    models::{CreateRole, Role, UpdateRole},
    services::MutationOutcome,
};

#[tracing::instrument(name = "admin.roles.create", skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreateRole>>,
) -> Result<(StatusCode, Json<MutationOutcome<Role>>), AdminError> {
    let outcome = state.services.roles.create(input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[tracing::instrument(name = "admin.roles.list", skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Role>>, AdminError> {
    Ok(Json(state.services.roles.list().await?))
}

#[tracing::instrument(name = "admin.roles.get", skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, AdminError> {
    Ok(Json(state.services.roles.get_by_id(id).await?))
}

#[tracing::instrument(name = "admin.roles.get_by_name", skip(state))]
pub async fn get_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Role>, AdminError> {
    Ok(Json(state.services.roles.get_by_name(&name).await?))
}

/// Rename or re-describe a role. Renames re-key registry mappings.
#[tracing::instrument(name = "admin.roles.update", skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateRole>>,
) -> Result<Json<MutationOutcome<Role>>, AdminError> {
    Ok(Json(state.services.roles.update(id, input).await?))
}

#[tracing::instrument(name = "admin.roles.delete", skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationOutcome<Role>>, AdminError> {
    Ok(Json(state.services.roles.delete(id).await?))
}
