use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Caller identity resolution.
///
/// Tokens are validated upstream (identity-aware proxy or ingress). The
/// verified principal arrives in trusted headers, which must be stripped from
/// untrusted traffic before it reaches this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Header containing the authenticated principal (username or subject).
    #[serde(default = "default_identity_header")]
    pub identity_header: String,

    /// Header containing granted roles (comma-separated).
    #[serde(default = "default_roles_header")]
    pub roles_header: String,

    /// Header containing the user's email.
    #[serde(default)]
    pub email_header: Option<String>,

    /// Reject non-public requests without an identity header (401) instead of
    /// evaluating them as anonymous.
    #[serde(default)]
    pub require_identity: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_header: default_identity_header(),
            roles_header: default_roles_header(),
            email_header: None,
            require_identity: false,
        }
    }
}

impl AuthConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_header.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.identity_header cannot be empty".into(),
            ));
        }
        if self.roles_header.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.roles_header cannot be empty".into(),
            ));
        }
        for name in [Some(&self.identity_header), Some(&self.roles_header), self.email_header.as_ref()]
            .into_iter()
            .flatten()
        {
            http::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigError::Validation(format!("Invalid header name in [auth]: '{name}'"))
            })?;
        }
        Ok(())
    }
}

fn default_identity_header() -> String {
    "X-Forwarded-User".to_string()
}

fn default_roles_header() -> String {
    "X-Forwarded-Roles".to_string()
}
