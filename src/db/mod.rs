//! Storage for users, roles and resources.
//!
//! Services depend on the repository traits only. The bundled backend keeps
//! everything in memory; the registry is rebuilt from the resource store at
//! start-up, so nothing here needs to be durable for authorization to work.

mod error;
pub mod memory;
pub mod repos;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

/// Repository trait objects, created once at startup.
#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub roles: Arc<dyn RoleRepo>,
    pub resources: Arc<dyn ResourceRepo>,
}

impl Repos {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(memory::MemoryUserRepo::default()),
            roles: Arc::new(memory::MemoryRoleRepo::default()),
            resources: Arc::new(memory::MemoryResourceRepo::default()),
        }
    }
}
