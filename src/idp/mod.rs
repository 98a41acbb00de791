//! Identity-provider mirroring.
//!
//! The administration service is the source of truth for users and roles.
//! Every mutation is mirrored to an external identity provider through the
//! [`IdentityProvider`] trait so that tokens it issues carry the same roles.
//! Mirroring is best-effort: callers record failures instead of rolling back.

mod error;
mod keycloak;
pub mod retry;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
pub use error::{IdpError, IdpResult};
pub use keycloak::KeycloakClient;
use serde::{Deserialize, Serialize};

/// Realm roles the provider manages itself. Never unassigned by a sync.
pub fn is_builtin_role(name: &str) -> bool {
    name.starts_with("default-roles-") || name == "offline_access" || name == "uma_authorization"
}

/// User as represented by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<IdpCredential>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdpCredential {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub temporary: bool,
}

impl IdpCredential {
    pub fn password(value: impl Into<String>) -> Self {
        Self {
            kind: "password".to_string(),
            value: value.into(),
            temporary: false,
        }
    }
}

/// Realm role as represented by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdpRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IdpRole {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description,
        }
    }
}

/// Admin operations against an external identity provider.
///
/// Users are addressed by username and roles by name; implementations resolve
/// provider-side ids themselves.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// False for the no-op provider. Mutations then report a skipped mirror.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn create_user(&self, user: &IdpUser) -> IdpResult<()>;

    async fn find_user(&self, username: &str) -> IdpResult<Option<IdpUser>>;

    /// Replace the profile of an existing user. Credentials are not touched.
    async fn update_user(&self, username: &str, user: &IdpUser) -> IdpResult<()>;

    /// Remove a user. Deleting an absent user succeeds.
    async fn delete_user(&self, username: &str) -> IdpResult<()>;

    async fn create_role(&self, role: &IdpRole) -> IdpResult<()>;

    async fn list_roles(&self) -> IdpResult<Vec<IdpRole>>;

    /// Update a role, possibly renaming it to `role.name`.
    async fn update_role(&self, name: &str, role: &IdpRole) -> IdpResult<()>;

    /// Remove a role. Deleting an absent role succeeds.
    async fn delete_role(&self, name: &str) -> IdpResult<()>;

    async fn list_user_roles(&self, username: &str) -> IdpResult<BTreeSet<String>>;

    async fn assign_roles(&self, username: &str, roles: &BTreeSet<String>) -> IdpResult<()>;

    async fn unassign_roles(&self, username: &str, roles: &BTreeSet<String>) -> IdpResult<()>;

    /// Make the user's realm roles equal `desired`, ignoring builtin roles.
    ///
    /// Stale roles are unassigned before missing ones are assigned. Empty
    /// halves of the diff make no call.
    async fn sync_user_roles(&self, username: &str, desired: &BTreeSet<String>) -> IdpResult<()> {
        let current: BTreeSet<String> = self
            .list_user_roles(username)
            .await?
            .into_iter()
            .filter(|r| !is_builtin_role(r))
            .collect();

        let stale: BTreeSet<String> = current.difference(desired).cloned().collect();
        let missing: BTreeSet<String> = desired.difference(&current).cloned().collect();

        if !stale.is_empty() {
            self.unassign_roles(username, &stale).await?;
        }
        if !missing.is_empty() {
            self.assign_roles(username, &missing).await?;
        }
        Ok(())
    }
}

/// Used when no identity provider is configured. Every call succeeds and
/// does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIdentityProvider;

#[async_trait]
impl IdentityProvider for NoopIdentityProvider {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn create_user(&self, _user: &IdpUser) -> IdpResult<()> {
        Ok(())
    }

    async fn find_user(&self, _username: &str) -> IdpResult<Option<IdpUser>> {
        Ok(None)
    }

    async fn update_user(&self, _username: &str, _user: &IdpUser) -> IdpResult<()> {
        Ok(())
    }

    async fn delete_user(&self, _username: &str) -> IdpResult<()> {
        Ok(())
    }

    async fn create_role(&self, _role: &IdpRole) -> IdpResult<()> {
        Ok(())
    }

    async fn list_roles(&self) -> IdpResult<Vec<IdpRole>> {
        Ok(Vec::new())
    }

    async fn update_role(&self, _name: &str, _role: &IdpRole) -> IdpResult<()> {
        Ok(())
    }

    async fn delete_role(&self, _name: &str) -> IdpResult<()> {
        Ok(())
    }

    async fn list_user_roles(&self, _username: &str) -> IdpResult<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn assign_roles(&self, _username: &str, _roles: &BTreeSet<String>) -> IdpResult<()> {
        Ok(())
    }

    async fn unassign_roles(&self, _username: &str, _roles: &BTreeSet<String>) -> IdpResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records role calls against a fixed current role set.
    struct RecordingProvider {
        current: BTreeSet<String>,
        calls: Mutex<Vec<(String, BTreeSet<String>)>>,
    }

    impl RecordingProvider {
        fn with_roles(roles: &[&str]) -> Self {
            Self {
                current: roles.iter().map(|r| r.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for RecordingProvider {
        async fn create_user(&self, _user: &IdpUser) -> IdpResult<()> {
            Ok(())
        }
        async fn find_user(&self, _username: &str) -> IdpResult<Option<IdpUser>> {
            Ok(None)
        }
        async fn update_user(&self, _username: &str, _user: &IdpUser) -> IdpResult<()> {
            Ok(())
        }
        async fn delete_user(&self, _username: &str) -> IdpResult<()> {
            Ok(())
        }
        async fn create_role(&self, _role: &IdpRole) -> IdpResult<()> {
            Ok(())
        }
        async fn list_roles(&self) -> IdpResult<Vec<IdpRole>> {
            Ok(Vec::new())
        }
        async fn update_role(&self, _name: &str, _role: &IdpRole) -> IdpResult<()> {
            Ok(())
        }
        async fn delete_role(&self, _name: &str) -> IdpResult<()> {
            Ok(())
        }
        async fn list_user_roles(&self, _username: &str) -> IdpResult<BTreeSet<String>> {
            Ok(self.current.clone())
        }
        async fn assign_roles(&self, _username: &str, roles: &BTreeSet<String>) -> IdpResult<()> {
            self.calls.lock().push(("assign".into(), roles.clone()));
            Ok(())
        }
        async fn unassign_roles(&self, _username: &str, roles: &BTreeSet<String>) -> IdpResult<()> {
            self.calls.lock().push(("unassign".into(), roles.clone()));
            Ok(())
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sync_unassigns_before_assigning() {
        let idp = RecordingProvider::with_roles(&["ROLE_A", "ROLE_B"]);
        idp.sync_user_roles("alice", &set(&["ROLE_B", "ROLE_C"]))
            .await
            .unwrap();

        let calls = idp.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                ("unassign".to_string(), set(&["ROLE_A"])),
                ("assign".to_string(), set(&["ROLE_C"])),
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_leaves_builtin_roles_alone() {
        let idp = RecordingProvider::with_roles(&["default-roles-warden", "offline_access", "ROLE_USER"]);
        idp.sync_user_roles("alice", &set(&["ROLE_USER"]))
            .await
            .unwrap();

        assert!(idp.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_noop_provider_is_disabled() {
        let idp = NoopIdentityProvider;
        assert!(!idp.is_enabled());
        assert!(idp.find_user("alice").await.unwrap().is_none());
        assert!(idp.sync_user_roles("alice", &set(&["ROLE_USER"])).await.is_ok());
    }

    #[test]
    fn test_user_representation_uses_camel_case() {
        let user = IdpUser {
            username: "alice".into(),
            first_name: Some("Alice".into()),
            enabled: true,
            credentials: vec![IdpCredential::password("secret")],
            ..IdpUser::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["credentials"][0]["type"], "password");
        assert!(json.get("id").is_none());
    }
}
