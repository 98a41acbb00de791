use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::authz::{DEFAULT_EFFECT, Mapping, PathPattern};

/// Path authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    /// Enable authorization. When disabled, every request is allowed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Effect applied when no mapping matches the request path.
    #[serde(default = "default_effect")]
    pub default_effect: PolicyEffect,

    /// Ant-style patterns that bypass authorization entirely.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Audit logging for authorization decisions.
    #[serde(default)]
    pub audit: AuthzAuditConfig,

    /// Mappings seeded into the registry at start-up, before stored resources.
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_effect: default_effect(),
            public_paths: default_public_paths(),
            audit: AuthzAuditConfig::default(),
            mappings: Vec::new(),
        }
    }
}

impl AuthzConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for path in &self.public_paths {
            PathPattern::parse(path).map_err(|e| {
                ConfigError::Validation(format!("Invalid public path '{path}': {e}"))
            })?;
        }
        for mapping in &self.mappings {
            mapping.validate().map_err(ConfigError::Validation)?;
        }
        Ok(())
    }

    /// Seed mappings in registry form.
    pub fn seed_mappings(&self) -> Vec<Mapping> {
        self.mappings
            .iter()
            .map(|m| Mapping::new(m.priority, m.pattern.clone(), m.roles.iter().cloned()))
            .collect()
    }
}

/// A statically configured mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    pub priority: i64,
    pub pattern: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl MappingConfig {
    fn validate(&self) -> Result<(), String> {
        PathPattern::parse(&self.pattern)
            .map_err(|e| format!("Invalid mapping pattern '{}': {e}", self.pattern))?;
        if self.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(format!(
                "Mapping '{}' contains an empty role name",
                self.pattern
            ));
        }
        Ok(())
    }
}

/// Which authorization decisions are written to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzAuditConfig {
    /// Log granted requests (info level).
    #[serde(default)]
    pub log_allowed: bool,

    /// Log denied requests (warn level).
    #[serde(default = "default_true")]
    pub log_denied: bool,
}

impl Default for AuthzAuditConfig {
    fn default() -> Self {
        Self {
            log_allowed: false,
            log_denied: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    #[default]
    Deny,
}

impl PolicyEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyEffect::Allow => "allow",
            PolicyEffect::Deny => "deny",
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyEffect::Allow)
    }
}

fn default_effect() -> PolicyEffect {
    DEFAULT_EFFECT
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string(), "/health/**".to_string()]
}

fn default_true() -> bool {
    true
}
