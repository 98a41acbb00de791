//! Configuration for the warden gateway and administration service.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [authz]
//! default_effect = "deny"
//! public_paths = ["/", "/health/**"]
//!
//! [[authz.mappings]]
//! priority = 1
//! pattern = "/admin/**"
//! roles = ["ROLE_ADMIN"]
//!
//! [idp]
//! enabled = true
//! base_url = "https://sso.example.com"
//! realm = "warden"
//! admin_token = "${IDP_ADMIN_TOKEN}"
//!
//! [[gateway.routes]]
//! id = "user-service"
//! path_prefix = "/user-service"
//! upstream = "http://user-service:8081"
//! ```

mod auth;
mod authz;
mod gateway;
mod idp;
mod observability;
mod server;
mod users;

use std::{path::Path, sync::LazyLock};

pub use auth::*;
pub use authz::*;
pub use gateway::*;
pub use idp::*;
pub use observability::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use server::*;
pub use users::*;

/// Root configuration.
///
/// Every section is optional with defaults, so an empty file is a valid
/// (deny-by-default, IdP-disabled) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Caller identity resolution.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Path-to-role authorization.
    #[serde(default)]
    pub authz: AuthzConfig,

    /// Identity-provider mirroring.
    #[serde(default)]
    pub idp: IdpConfig,

    /// Downstream routes and credential relay.
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub users: UsersConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: WardenConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;
        self.authz.validate()?;
        self.idp.validate()?;
        self.gateway.validate()?;
        self.users.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand `${VAR}` references, ignoring anything after a `#` on the line.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let whole = cap.get_match();
            if comment_pos.is_some_and(|pos| whole.start() >= pos) {
                break;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
