use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::error::DbResult, models::Resource};

/// Resource persistence. Patterns are unique.
#[async_trait]
pub trait ResourceRepo: Send + Sync {
    async fn create(&self, resource: Resource) -> DbResult<Resource>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Resource>>;
    async fn get_by_pattern(&self, pattern: &str) -> DbResult<Option<Resource>>;
    /// All resources ordered by priority, then creation time.
    async fn list(&self) -> DbResult<Vec<Resource>>;
    async fn list_by_role(&self, role_id: Uuid) -> DbResult<Vec<Resource>>;
    async fn update(&self, resource: Resource) -> DbResult<Resource>;
    async fn delete(&self, id: Uuid) -> DbResult<()>;
}
