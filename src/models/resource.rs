use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::{validate_http_method, validate_pattern};

/// A protected path pattern and the roles allowed to reach it.
///
/// The store is the source of truth; active resources are mirrored into the
/// mapping registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    /// Unique Ant-style path pattern.
    pub pattern: String,
    /// Informational; authorization matches on path only.
    pub http_method: Option<String>,
    pub description: Option<String>,
    /// Evaluation order, lower first.
    pub priority: i64,
    /// Inactive resources stay stored but are not enforced.
    pub is_active: bool,
    pub role_ids: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resource with role ids resolved to names, as returned by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceWithRoles {
    #[serde(flatten)]
    pub resource: Resource,
    pub roles: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateResource {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(custom(function = "validate_pattern"))]
    pub pattern: String,
    #[validate(custom(function = "validate_http_method"))]
    pub http_method: Option<String>,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(range(min = -1_000_000, max = 1_000_000))]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateResource {
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_pattern"))]
    pub pattern: Option<String>,
    #[validate(custom(function = "validate_http_method"))]
    pub http_method: Option<String>,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    #[validate(range(min = -1_000_000, max = 1_000_000))]
    pub priority: Option<i64>,
    pub is_active: Option<bool>,
    /// Replacement role set. Applied as a delta against the current roles.
    pub role_ids: Option<Vec<Uuid>>,
}

/// Roles added and removed by a resource update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleDelta {
    pub added: BTreeSet<Uuid>,
    pub removed: BTreeSet<Uuid>,
}

impl RoleDelta {
    /// Symmetric difference between `current` and `desired`, split by direction.
    pub fn between(current: &BTreeSet<Uuid>, desired: &BTreeSet<Uuid>) -> Self {
        Self {
            added: desired.difference(current).copied().collect(),
            removed: current.difference(desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Apply in place: unaffected ids are left untouched.
    pub fn apply(&self, roles: &mut BTreeSet<Uuid>) {
        roles.retain(|id| !self.removed.contains(id));
        roles.extend(self.added.iter().copied());
    }
}

fn default_true() -> bool {
    true
}
