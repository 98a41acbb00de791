use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{User, UserQuery},
};

/// User persistence.
///
/// Lookups return soft-deleted rows too; filtering them is the caller's job.
/// `username`, `email` and `phone_number` are unique among non-deleted users.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, user: User) -> DbResult<User>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>>;
    async fn get_by_username(&self, username: &str) -> DbResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>>;
    async fn get_by_phone(&self, phone_number: &str) -> DbResult<Option<User>>;
    async fn update(&self, user: User) -> DbResult<User>;
    /// Non-deleted users matching `query`, ordered by username, plus the total
    /// match count.
    async fn search(&self, query: &UserQuery) -> DbResult<(Vec<User>, u64)>;
    /// Detach a role from every user. Returns the number of users changed.
    async fn remove_role_from_all(&self, role_id: Uuid) -> DbResult<u64>;
}
