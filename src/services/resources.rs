use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{
    error::{ServiceError, ServiceResult},
    outcome::{MirrorStatus, MutationOutcome},
    role_names,
};
use crate::{
    authz::{Mapping, MappingStore},
    db::Repos,
    models::{CreateResource, Resource, ResourceWithRoles, RoleDelta, UpdateResource},
};

/// Result of a resource update: the new state and the role delta applied.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceUpdate {
    pub resource: ResourceWithRoles,
    pub roles_added: BTreeSet<String>,
    pub roles_removed: BTreeSet<String>,
}

/// Resource administration. The resource store is the source of truth; every
/// change to an active resource is pushed into the mapping registry.
#[derive(Clone)]
pub struct ResourceService {
    repos: Repos,
    registry: Arc<dyn MappingStore>,
    /// Static mappings from configuration, loaded underneath stored resources.
    seeds: Arc<Vec<Mapping>>,
}

impl ResourceService {
    pub fn new(repos: Repos, registry: Arc<dyn MappingStore>, seeds: Vec<Mapping>) -> Self {
        Self {
            repos,
            registry,
            seeds: Arc::new(seeds),
        }
    }

    /// Check that every id names an existing role.
    async fn require_roles(&self, ids: &BTreeSet<Uuid>) -> ServiceResult<BTreeSet<String>> {
        let found = self
            .repos
            .roles
            .get_many(&ids.iter().copied().collect::<Vec<_>>())
            .await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|r| r.id == **id)) {
            return Err(ServiceError::NotFound(format!("Role {missing}")));
        }
        Ok(found.into_iter().map(|r| r.name).collect())
    }

    async fn with_roles(&self, resource: Resource) -> ServiceResult<ResourceWithRoles> {
        let roles = role_names(&*self.repos.roles, &resource.role_ids).await?;
        Ok(ResourceWithRoles { resource, roles })
    }

    /// Create a resource and, when active, its mapping.
    ///
    /// # Errors
    /// - Conflict if the pattern is already used by another resource
    /// - NotFound if any role id is unknown
    pub async fn create(
        &self,
        input: CreateResource,
    ) -> ServiceResult<MutationOutcome<ResourceWithRoles>> {
        let pattern = input.pattern.trim().to_string();
        if self.repos.resources.get_by_pattern(&pattern).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A resource with pattern '{pattern}' already exists"
            )));
        }

        let role_ids: BTreeSet<Uuid> = input.role_ids.into_iter().collect();
        let roles = self.require_roles(&role_ids).await?;

        let now = Utc::now();
        let resource = self
            .repos
            .resources
            .create(Resource {
                id: Uuid::new_v4(),
                name: input.name,
                pattern,
                http_method: input.http_method.map(|m| m.to_ascii_uppercase()),
                description: input.description,
                priority: input.priority,
                is_active: input.is_active,
                role_ids,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let registry = if resource.is_active {
            self.registry
                .on_resource_created(&resource.pattern, resource.priority, roles.clone());
            MirrorStatus::Applied
        } else {
            MirrorStatus::Skipped
        };

        info!(
            pattern = %resource.pattern,
            priority = resource.priority,
            active = resource.is_active,
            "Resource created"
        );
        Ok(MutationOutcome::new(
            ResourceWithRoles { resource, roles },
            registry,
            MirrorStatus::Skipped,
        ))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<ResourceWithRoles> {
        let resource = self.find(id).await?;
        self.with_roles(resource).await
    }

    async fn find(&self, id: Uuid) -> ServiceResult<Resource> {
        self.repos
            .resources
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Resource {id}")))
    }

    /// All resources in evaluation order.
    pub async fn list(&self) -> ServiceResult<Vec<ResourceWithRoles>> {
        let mut out = Vec::new();
        for resource in self.repos.resources.list().await? {
            out.push(self.with_roles(resource).await?);
        }
        Ok(out)
    }

    /// Update a resource.
    ///
    /// A new role set is applied as a delta: roles present in both the old and
    /// new sets are untouched. The registry sees the change through
    /// `on_resource_updated`, which drops the old pattern when it changed.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateResource,
    ) -> ServiceResult<MutationOutcome<ResourceUpdate>> {
        let mut resource = self.find(id).await?;
        let before = resource.clone();

        if let Some(pattern) = input.pattern.as_deref().map(str::trim)
            && pattern != before.pattern
        {
            if self.repos.resources.get_by_pattern(pattern).await?.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "A resource with pattern '{pattern}' already exists"
                )));
            }
            resource.pattern = pattern.to_string();
        }

        let delta = match input.role_ids {
            Some(ids) => {
                let desired: BTreeSet<Uuid> = ids.into_iter().collect();
                self.require_roles(&desired).await?;
                RoleDelta::between(&resource.role_ids, &desired)
            }
            None => RoleDelta::default(),
        };
        delta.apply(&mut resource.role_ids);

        if let Some(name) = input.name {
            resource.name = name;
        }
        if let Some(method) = input.http_method {
            resource.http_method = Some(method.to_ascii_uppercase());
        }
        if input.description.is_some() {
            resource.description = input.description;
        }
        if let Some(priority) = input.priority {
            resource.priority = priority;
        }
        if let Some(active) = input.is_active {
            resource.is_active = active;
        }
        resource.updated_at = Utc::now();

        let resource = self.repos.resources.update(resource).await?;
        let roles = role_names(&*self.repos.roles, &resource.role_ids).await?;

        let registry = match (before.is_active, resource.is_active) {
            (true, true) => {
                self.registry.on_resource_updated(
                    &before.pattern,
                    &resource.pattern,
                    resource.priority,
                    roles.clone(),
                );
                MirrorStatus::Applied
            }
            (true, false) => {
                self.registry.on_resource_deleted(&before.pattern);
                MirrorStatus::Applied
            }
            (false, true) => {
                self.registry
                    .on_resource_created(&resource.pattern, resource.priority, roles.clone());
                MirrorStatus::Applied
            }
            (false, false) => MirrorStatus::Skipped,
        };

        let roles_added = role_names(&*self.repos.roles, &delta.added).await?;
        let roles_removed = role_names(&*self.repos.roles, &delta.removed).await?;

        info!(
            pattern = %resource.pattern,
            previous_pattern = %before.pattern,
            priority = resource.priority,
            added = roles_added.len(),
            removed = roles_removed.len(),
            "Resource updated"
        );
        Ok(MutationOutcome::new(
            ResourceUpdate {
                resource: ResourceWithRoles { resource, roles },
                roles_added,
                roles_removed,
            },
            registry,
            MirrorStatus::Skipped,
        ))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<MutationOutcome<ResourceWithRoles>> {
        let resource = self.find(id).await?;
        let with_roles = self.with_roles(resource).await?;
        self.repos.resources.delete(id).await?;

        let registry = if with_roles.resource.is_active {
            self.registry.on_resource_deleted(&with_roles.resource.pattern);
            MirrorStatus::Applied
        } else {
            MirrorStatus::Skipped
        };

        info!(pattern = %with_roles.resource.pattern, "Resource deleted");
        Ok(MutationOutcome::new(with_roles, registry, MirrorStatus::Skipped))
    }

    /// Rebuild the registry from configuration seeds and every active stored
    /// resource. A stored resource overrides a seed with the same pattern.
    ///
    /// Returns the number of mappings loaded.
    pub async fn reload_registry(&self) -> ServiceResult<usize> {
        let mut mappings: Vec<Mapping> = self.seeds.as_ref().clone();
        for resource in self.repos.resources.list().await? {
            if !resource.is_active {
                continue;
            }
            let roles = role_names(&*self.repos.roles, &resource.role_ids).await?;
            mappings.push(Mapping::new(resource.priority, resource.pattern, roles));
        }

        self.registry.replace_all(mappings);
        Ok(self.registry.snapshot().len())
    }
}
