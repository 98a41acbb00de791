//! Keycloak realm admin REST client.

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use tracing::debug;

use super::{IdentityProvider, IdpError, IdpResult, IdpRole, IdpUser, retry::with_retry};
use crate::config::{IdpConfig, RetryConfig};

/// Talks to `{base_url}/admin/realms/{realm}` with a static bearer token.
#[derive(Debug, Clone)]
pub struct KeycloakClient {
    client: Client,
    admin_url: Url,
    token: String,
    retry: RetryConfig,
}

impl KeycloakClient {
    pub fn new(config: &IdpConfig) -> IdpResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: &IdpConfig) -> IdpResult<Self> {
        let mut admin_url = Url::parse(&config.base_url)
            .map_err(|e| IdpError::InvalidResponse(format!("invalid base URL: {e}")))?;
        admin_url
            .path_segments_mut()
            .map_err(|_| IdpError::InvalidResponse("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["admin", "realms", config.realm.as_str()]);

        Ok(Self {
            client,
            admin_url,
            token: config.admin_token.clone(),
            retry: config.retry.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.admin_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Send with retry and map any non-2xx status to an [`IdpError`].
    async fn send<F>(&self, operation: &str, what: &str, build: F) -> IdpResult<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = with_retry(&self.retry, operation, || {
            build().bearer_auth(&self.token).send()
        })
        .await?;

        if response.status().is_success() {
            debug!(operation, status = %response.status(), "Identity provider call succeeded");
            Ok(response)
        } else {
            Err(IdpError::from_response(what, response).await)
        }
    }

    async fn user_id(&self, username: &str) -> IdpResult<String> {
        self.find_user(username)
            .await?
            .and_then(|u| u.id)
            .ok_or_else(|| IdpError::NotFound(format!("user '{username}'")))
    }

    /// Resolve role names to full representations; the role-mapping
    /// endpoints need ids.
    async fn resolve_roles(&self, names: &BTreeSet<String>) -> IdpResult<Vec<IdpRole>> {
        let known = self.list_roles().await?;
        let resolved: Vec<IdpRole> = known
            .into_iter()
            .filter(|r| names.contains(&r.name))
            .collect();

        if resolved.len() != names.len() {
            let missing: Vec<&str> = names
                .iter()
                .filter(|n| !resolved.iter().any(|r| &&r.name == n))
                .map(String::as_str)
                .collect();
            return Err(IdpError::NotFound(format!("roles {}", missing.join(", "))));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn create_user(&self, user: &IdpUser) -> IdpResult<()> {
        let url = self.endpoint(&["users"]);
        self.send("idp.create_user", &format!("user '{}'", user.username), || {
            self.client.post(url.clone()).json(user)
        })
        .await?;
        Ok(())
    }

    async fn find_user(&self, username: &str) -> IdpResult<Option<IdpUser>> {
        let url = self.endpoint(&["users"]);
        let response = self
            .send("idp.find_user", &format!("user '{username}'"), || {
                self.client
                    .get(url.clone())
                    .query(&[("username", username), ("exact", "true")])
            })
            .await?;

        let users: Vec<IdpUser> = response
            .json()
            .await
            .map_err(|e| IdpError::InvalidResponse(e.to_string()))?;
        Ok(users
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username)))
    }

    async fn update_user(&self, username: &str, user: &IdpUser) -> IdpResult<()> {
        let id = self.user_id(username).await?;
        let url = self.endpoint(&["users", &id]);
        let mut body = user.clone();
        body.id = Some(id.clone());
        body.credentials.clear();

        self.send("idp.update_user", &format!("user '{username}'"), || {
            self.client.put(url.clone()).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> IdpResult<()> {
        let Some(id) = self.find_user(username).await?.and_then(|u| u.id) else {
            debug!(username, "User absent from identity provider, nothing to delete");
            return Ok(());
        };
        let url = self.endpoint(&["users", &id]);
        match self
            .send("idp.delete_user", &format!("user '{username}'"), || {
                self.client.delete(url.clone())
            })
            .await
        {
            Ok(_) | Err(IdpError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn create_role(&self, role: &IdpRole) -> IdpResult<()> {
        let url = self.endpoint(&["roles"]);
        self.send("idp.create_role", &format!("role '{}'", role.name), || {
            self.client.post(url.clone()).json(role)
        })
        .await?;
        Ok(())
    }

    async fn list_roles(&self) -> IdpResult<Vec<IdpRole>> {
        let url = self.endpoint(&["roles"]);
        let response = self
            .send("idp.list_roles", "roles", || self.client.get(url.clone()))
            .await?;
        response
            .json()
            .await
            .map_err(|e| IdpError::InvalidResponse(e.to_string()))
    }

    async fn update_role(&self, name: &str, role: &IdpRole) -> IdpResult<()> {
        let url = self.endpoint(&["roles", name]);
        self.send("idp.update_role", &format!("role '{name}'"), || {
            self.client.put(url.clone()).json(role)
        })
        .await?;
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> IdpResult<()> {
        let url = self.endpoint(&["roles", name]);
        match self
            .send("idp.delete_role", &format!("role '{name}'"), || {
                self.client.delete(url.clone())
            })
            .await
        {
            Ok(_) | Err(IdpError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_user_roles(&self, username: &str) -> IdpResult<BTreeSet<String>> {
        let id = self.user_id(username).await?;
        let url = self.endpoint(&["users", &id, "role-mappings", "realm"]);
        let response = self
            .send("idp.list_user_roles", &format!("user '{username}'"), || {
                self.client.get(url.clone())
            })
            .await?;
        let roles: Vec<IdpRole> = response
            .json()
            .await
            .map_err(|e| IdpError::InvalidResponse(e.to_string()))?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    async fn assign_roles(&self, username: &str, roles: &BTreeSet<String>) -> IdpResult<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let id = self.user_id(username).await?;
        let body = self.resolve_roles(roles).await?;
        let url = self.endpoint(&["users", &id, "role-mappings", "realm"]);
        self.send("idp.assign_roles", &format!("user '{username}'"), || {
            self.client.post(url.clone()).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn unassign_roles(&self, username: &str, roles: &BTreeSet<String>) -> IdpResult<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let id = self.user_id(username).await?;
        let body = self.resolve_roles(roles).await?;
        let url = self.endpoint(&["users", &id, "role-mappings", "realm"]);
        self.send("idp.unassign_roles", &format!("user '{username}'"), || {
            self.client.delete(url.clone()).json(&body)
        })
        .await?;
        Ok(())
    }
}
