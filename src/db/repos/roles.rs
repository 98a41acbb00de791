use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::error::DbResult, models::Role};

/// Role persistence. Names are unique.
#[async_trait]
pub trait RoleRepo: Send + Sync {
    async fn create(&self, role: Role) -> DbResult<Role>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Role>>;
    async fn get_by_name(&self, name: &str) -> DbResult<Option<Role>>;
    /// Roles for the given ids. Unknown ids are skipped.
    async fn get_many(&self, ids: &[Uuid]) -> DbResult<Vec<Role>>;
    /// All roles ordered by name.
    async fn list(&self) -> DbResult<Vec<Role>>;
    async fn update(&self, role: Role) -> DbResult<Role>;
    async fn delete(&self, id: Uuid) -> DbResult<()>;
}
