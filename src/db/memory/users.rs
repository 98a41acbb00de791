use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    db::{DbError, DbResult, repos::UserRepo},
    models::{User, UserQuery},
};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<Uuid, User>>,
}

fn check_unique<'a>(
    existing: impl Iterator<Item = &'a User>,
    candidate: &User,
) -> DbResult<()> {
    for other in existing.filter(|u| !u.is_deleted && u.id != candidate.id) {
        if other.username.eq_ignore_ascii_case(&candidate.username) {
            return Err(DbError::Conflict(format!(
                "Username '{}' is already taken",
                candidate.username
            )));
        }
        if other.email == candidate.email {
            return Err(DbError::Conflict(format!(
                "Email '{}' is already registered",
                candidate.email
            )));
        }
        if other.phone_number.is_some() && other.phone_number == candidate.phone_number {
            return Err(DbError::Conflict(
                "Phone number is already registered".to_string(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: User) -> DbResult<User> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(DbError::Conflict(format!("User {} already exists", user.id)));
        }
        check_unique(users.values(), &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| !u.is_deleted && u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| !u.is_deleted && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_phone(&self, phone_number: &str) -> DbResult<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| !u.is_deleted && u.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn update(&self, user: User) -> DbResult<User> {
        let mut users = self.users.write();
        if !users.contains_key(&user.id) {
            return Err(DbError::NotFound);
        }
        check_unique(users.values(), &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn search(&self, query: &UserQuery) -> DbResult<(Vec<User>, u64)> {
        let needle = query
            .username_contains
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let users = self.users.read();
        let mut matched: Vec<&User> = users
            .values()
            .filter(|u| !u.is_deleted)
            .filter(|u| {
                needle
                    .as_ref()
                    .is_none_or(|n| u.username.to_lowercase().contains(n))
            })
            .filter(|u| query.role_ids.is_empty() || !u.role_ids.is_disjoint(&query.role_ids))
            .collect();
        matched.sort_by(|a, b| a.username.cmp(&b.username));

        let total = matched.len() as u64;
        let offset = (query.page as usize).saturating_mul(query.size as usize);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(query.size as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn remove_role_from_all(&self, role_id: Uuid) -> DbResult<u64> {
        let mut changed = 0;
        for user in self.users.write().values_mut() {
            if user.role_ids.remove(&role_id) {
                user.updated_at = chrono::Utc::now();
                changed += 1;
            }
        }
        Ok(changed)
    }
}
