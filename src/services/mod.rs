//! Administration services for users, roles and resources.
//!
//! Each mutation touches up to three places that fail independently: the
//! local store (authoritative, errors fail the call), the mapping registry and
//! the identity provider. The last two are reported per call through
//! [`MutationOutcome`] and never roll back the local change.

mod error;
mod outcome;
mod password;
mod resources;
mod roles;
mod users;

use std::{collections::BTreeSet, sync::Arc};

pub use error::{ServiceError, ServiceResult};
pub use outcome::{MirrorStatus, MutationOutcome};
pub use password::{Argon2PasswordHasher, PasswordError, PasswordHasher};
pub use resources::{ResourceService, ResourceUpdate};
pub use roles::RoleService;
pub use users::UserService;
use uuid::Uuid;

use crate::{
    authz::MappingStore,
    config::WardenConfig,
    db::{DbResult, Repos, RoleRepo},
    idp::IdentityProvider,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub roles: RoleService,
    pub resources: ResourceService,
}

impl Services {
    pub fn new(
        repos: Repos,
        registry: Arc<dyn MappingStore>,
        idp: Arc<dyn IdentityProvider>,
        config: &WardenConfig,
    ) -> Self {
        let roles = RoleService::new(repos.clone(), registry.clone(), idp.clone());
        Self {
            users: UserService::new(
                repos.clone(),
                roles.clone(),
                idp,
                Arc::new(Argon2PasswordHasher::from_config(
                    &config.users.password_hashing,
                )),
                config.users.clone(),
            ),
            resources: ResourceService::new(repos, registry, config.authz.seed_mappings()),
            roles,
        }
    }
}

/// Resolve role ids to names. Ids of deleted roles are skipped.
pub(crate) async fn role_names(
    roles: &dyn RoleRepo,
    ids: &BTreeSet<Uuid>,
) -> DbResult<BTreeSet<String>> {
    if ids.is_empty() {
        return Ok(BTreeSet::new());
    }
    let ids: Vec<Uuid> = ids.iter().copied().collect();
    Ok(roles
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect())
}
