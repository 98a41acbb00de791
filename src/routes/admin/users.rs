use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_valid::Valid;
use uuid::Uuid;

use super::error::AdminError;
use crate::{
    AppState,
    auth::Principal,
    models::{CreateUser, Page, Role, UpdateUserProfile, UserSearch, UserView},
    services::{MirrorStatus, MutationOutcome},
};

/// Register a user
#[tracing::instrument(name = "admin.users.create", skip(state, principal, input))]
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(input)): Valid<Json<CreateUser>>,
) -> Result<(StatusCode, Json<MutationOutcome<UserView>>), AdminError> {
    let outcome = state.services.users.register(input).await?;
    tracing::info!(
        actor = principal.subject.as_deref().unwrap_or("anonymous"),
        user_id = %outcome.entity.id,
        "User registered"
    );
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Search users by username substring and role names
#[tracing::instrument(name = "admin.users.list", skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<UserSearch>>,
) -> Result<Json<Page<UserView>>, AdminError> {
    Ok(Json(state.services.users.search(query).await?))
}

#[tracing::instrument(name = "admin.users.get", skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, AdminError> {
    Ok(Json(state.services.users.get_basic_info(id).await?))
}

#[tracing::instrument(name = "admin.users.update", skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateUserProfile>>,
) -> Result<Json<MutationOutcome<UserView>>, AdminError> {
    Ok(Json(state.services.users.update_profile(id, input).await?))
}

/// Soft-delete a user and remove them from the identity provider
#[tracing::instrument(name = "admin.users.delete", skip(state, principal))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationOutcome<UserView>>, AdminError> {
    let outcome = state.services.users.delete(id).await?;
    tracing::info!(
        actor = principal.subject.as_deref().unwrap_or("anonymous"),
        user_id = %id,
        "User deleted"
    );
    Ok(Json(outcome))
}

#[tracing::instrument(name = "admin.users.roles", skip(state))]
pub async fn roles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Role>>, AdminError> {
    Ok(Json(state.services.users.get_roles(id).await?))
}

#[tracing::instrument(name = "admin.users.add_role", skip(state))]
pub async fn add_role(
    State(state): State<AppState>,
    Path((id, role)): Path<(Uuid, String)>,
) -> Result<Json<MutationOutcome<UserView>>, AdminError> {
    Ok(Json(state.services.users.add_role(id, &role).await?))
}

#[tracing::instrument(name = "admin.users.remove_role", skip(state))]
pub async fn remove_role(
    State(state): State<AppState>,
    Path((id, role)): Path<(Uuid, String)>,
) -> Result<Json<MutationOutcome<UserView>>, AdminError> {
    Ok(Json(state.services.users.remove_role(id, &role).await?))
}

/// Re-push a user's profile and roles to the identity provider
#[tracing::instrument(name = "admin.users.sync", skip(state))]
pub async fn sync(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorStatus>, AdminError> {
    Ok(Json(state.services.users.resync(id).await?))
}
