use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::auth::Principal;

/// Source of delegated bearer tokens, keyed by principal subject.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn lookup_delegated_token(&self, principal: &str) -> Option<String>;
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: DashMap<String, String>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: &HashMap<String, String>) -> Self {
        let store = Self::new();
        for (principal, token) in seeds {
            store.store(principal, token);
        }
        store
    }

    pub fn store(&self, principal: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(principal.into(), token.into());
    }

    /// Returns whether a token was present.
    pub fn revoke(&self, principal: &str) -> bool {
        self.tokens.remove(principal).is_some()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn lookup_delegated_token(&self, principal: &str) -> Option<String> {
        self.tokens.get(principal).map(|t| t.value().clone())
    }
}

/// Attaches the caller's delegated credential to outgoing requests.
///
/// Fail-open: when there is no principal, no token, or the token cannot be
/// carried in a header, the request is forwarded unchanged. Downstream
/// services still enforce their own authorization.
#[derive(Clone)]
pub struct CredentialRelay {
    store: Arc<dyn TokenStore>,
}

impl CredentialRelay {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Returns whether an `Authorization` header was set.
    pub async fn apply(&self, principal: Option<&Principal>, headers: &mut HeaderMap) -> bool {
        let Some(subject) = principal.and_then(|p| p.subject.as_deref()) else {
            return false;
        };

        let token = match self.store.lookup_delegated_token(subject).await {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                debug!(principal = subject, "No delegated token, forwarding unchanged");
                return false;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                true
            }
            Err(_) => {
                warn!(principal = subject, "Delegated token is not a valid header value, skipping");
                false
            }
        }
    }
}
