use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::{PHONE_REGEX, USERNAME_REGEX};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(max = 128))]
    pub state: Option<String>,
    #[validate(length(max = 128))]
    pub city: Option<String>,
    #[validate(length(max = 128))]
    pub area: Option<String>,
    #[validate(length(max = 255))]
    pub street: Option<String>,
    #[validate(length(max = 32))]
    pub building_number: Option<String>,
    #[validate(length(max = 32))]
    pub apartment: Option<String>,
    #[validate(length(max = 16))]
    pub zip_code: Option<String>,
}

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Lowercased.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    pub role_ids: BTreeSet<Uuid>,
    /// Soft-deleted users are hidden from reads and searches.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user with role names resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    pub roles: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    pub fn new(user: &User, roles: BTreeSet<String>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone_number: user.phone_number.clone(),
            address: user.address.clone(),
            roles,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 64), regex(path = *USERNAME_REGEX))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub last_name: Option<String>,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone_number: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserProfile {
    #[validate(length(min = 1, max = 128))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub last_name: Option<String>,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone_number: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
}

/// Store-level user query.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive substring of the username.
    pub username_contains: Option<String>,
    /// Users holding any of these roles. Empty means no role filter.
    pub role_ids: BTreeSet<Uuid>,
    /// Zero-based page index.
    pub page: u32,
    pub size: u32,
}

/// Admin-facing search parameters (role filter by name).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserSearch {
    #[validate(length(max = 64))]
    pub username: Option<String>,
    /// Comma-separated role names.
    pub roles: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[validate(range(min = 1, max = 1000))]
    pub size: Option<u32>,
}

impl UserSearch {
    pub fn role_names(&self) -> BTreeSet<String> {
        crate::authz::roles::role_set(self.roles.as_deref().unwrap_or("").split(','))
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(u64::from(self.size))
        }
    }
}
