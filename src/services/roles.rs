use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{
    error::{ServiceError, ServiceResult},
    outcome::{MirrorStatus, MutationOutcome, mirror},
    role_names,
};
use crate::{
    authz::MappingStore,
    db::Repos,
    idp::{IdentityProvider, IdpError, IdpRole},
    models::{CreateRole, Role, UpdateRole},
};

/// Role administration. Role names are what mappings and the identity
/// provider refer to, so renames are propagated to both.
#[derive(Clone)]
pub struct RoleService {
    repos: Repos,
    registry: Arc<dyn MappingStore>,
    idp: Arc<dyn IdentityProvider>,
}

impl RoleService {
    pub fn new(
        repos: Repos,
        registry: Arc<dyn MappingStore>,
        idp: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            repos,
            registry,
            idp,
        }
    }

    /// Create a role.
    ///
    /// # Errors
    /// Conflict if a role with the same name exists locally. A role that
    /// already exists in the identity provider is not an error.
    pub async fn create(&self, input: CreateRole) -> ServiceResult<MutationOutcome<Role>> {
        let name = input.name.trim();
        if self.repos.roles.get_by_name(name).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Role '{name}' already exists")));
        }

        let role = self
            .repos
            .roles
            .create(Role::new(name, input.description))
            .await?;
        let idp = self.mirror_role_created(&role).await;

        info!(role = %role.name, "Role created");
        Ok(MutationOutcome::new(role, MirrorStatus::Skipped, idp))
    }

    /// Return the named role, creating it (and its identity-provider copy)
    /// when absent.
    pub async fn ensure(
        &self,
        name: &str,
        description: &str,
    ) -> ServiceResult<(Role, MirrorStatus)> {
        if let Some(role) = self.repos.roles.get_by_name(name).await? {
            return Ok((role, MirrorStatus::Skipped));
        }

        let role = Role::new(name, Some(description.to_string()));
        let role = match self.repos.roles.create(role).await {
            Ok(role) => role,
            // Lost a race with a concurrent creator.
            Err(crate::db::DbError::Conflict(_)) => {
                return self
                    .repos
                    .roles
                    .get_by_name(name)
                    .await?
                    .map(|r| (r, MirrorStatus::Skipped))
                    .ok_or_else(|| ServiceError::NotFound(format!("Role '{name}'")));
            }
            Err(e) => return Err(e.into()),
        };
        let idp = self.mirror_role_created(&role).await;
        info!(role = %role.name, "Default role created");
        Ok((role, idp))
    }

    async fn mirror_role_created(&self, role: &Role) -> MirrorStatus {
        let body = IdpRole::new(&role.name, role.description.clone());
        mirror(&*self.idp, "idp.create_role", async {
            match self.idp.create_role(&body).await {
                Ok(()) | Err(IdpError::Conflict(_)) => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    pub async fn list(&self) -> ServiceResult<Vec<Role>> {
        Ok(self.repos.roles.list().await?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> ServiceResult<Role> {
        self.repos
            .roles
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Role {id}")))
    }

    pub async fn get_by_name(&self, name: &str) -> ServiceResult<Role> {
        self.repos
            .roles
            .get_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Role '{name}'")))
    }

    /// Update name and/or description.
    ///
    /// A rename re-keys every active mapping derived from a resource that
    /// requires this role.
    pub async fn update(&self, id: Uuid, input: UpdateRole) -> ServiceResult<MutationOutcome<Role>> {
        let mut role = self.get_by_id(id).await?;
        let old_name = role.name.clone();

        if let Some(name) = input.name.as_deref().map(str::trim)
            && name != old_name
        {
            if self.repos.roles.get_by_name(name).await?.is_some() {
                return Err(ServiceError::Conflict(format!("Role '{name}' already exists")));
            }
            role.name = name.to_string();
        }
        if input.description.is_some() {
            role.description = input.description;
        }
        role.updated_at = Utc::now();

        let role = self.repos.roles.update(role).await?;
        let renamed = role.name != old_name;

        let registry = if renamed {
            self.rekey_mappings(role.id).await?
        } else {
            MirrorStatus::Skipped
        };

        let body = IdpRole::new(&role.name, role.description.clone());
        let idp = mirror(
            &*self.idp,
            "idp.update_role",
            self.idp.update_role(&old_name, &body),
        )
        .await;

        if renamed {
            info!(from = %old_name, to = %role.name, "Role renamed");
        }
        Ok(MutationOutcome::new(role, registry, idp))
    }

    async fn rekey_mappings(&self, role_id: Uuid) -> ServiceResult<MirrorStatus> {
        let resources = self.repos.resources.list_by_role(role_id).await?;
        let mut status = MirrorStatus::Skipped;
        for resource in resources.iter().filter(|r| r.is_active) {
            let roles = role_names(&*self.repos.roles, &resource.role_ids).await?;
            self.registry
                .update(resource.priority, &resource.pattern, roles);
            status = MirrorStatus::Applied;
        }
        Ok(status)
    }

    /// Delete a role and detach it from every user.
    ///
    /// # Errors
    /// Conflict while any resource still requires the role.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<MutationOutcome<Role>> {
        let role = self.get_by_id(id).await?;

        let referencing = self.repos.resources.list_by_role(id).await?;
        if let Some(first) = referencing.first() {
            return Err(ServiceError::Conflict(format!(
                "Role '{}' is required by {} resource(s), including '{}'",
                role.name,
                referencing.len(),
                first.pattern
            )));
        }

        let detached = self.repos.users.remove_role_from_all(id).await?;
        self.repos.roles.delete(id).await?;

        let idp = mirror(&*self.idp, "idp.delete_role", self.idp.delete_role(&role.name)).await;

        info!(role = %role.name, detached_users = detached, "Role deleted");
        Ok(MutationOutcome::new(role, MirrorStatus::Skipped, idp))
    }
}
