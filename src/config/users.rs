use serde::{Deserialize, Serialize};

use super::ConfigError;

/// User administration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersConfig {
    /// Role created (if absent) and assigned to every registered user.
    #[serde(default = "default_role")]
    pub default_role: String,

    #[serde(default = "default_role_description")]
    pub default_role_description: String,

    #[serde(default = "default_page_size")]
    pub page_size_default: u32,

    #[serde(default = "max_page_size")]
    pub page_size_max: u32,

    #[serde(default)]
    pub password_hashing: PasswordHashingConfig,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            default_role_description: default_role_description(),
            page_size_default: default_page_size(),
            page_size_max: max_page_size(),
            password_hashing: PasswordHashingConfig::default(),
        }
    }
}

impl UsersConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_role.trim().is_empty() {
            return Err(ConfigError::Validation(
                "users.default_role cannot be empty".into(),
            ));
        }
        if self.page_size_default == 0 || self.page_size_default > self.page_size_max {
            return Err(ConfigError::Validation(
                "users.page_size_default must be between 1 and users.page_size_max".into(),
            ));
        }
        self.password_hashing.params().map_err(|e| {
            ConfigError::Validation(format!("users.password_hashing: {e}"))
        })?;
        Ok(())
    }
}

fn default_role() -> String {
    "ROLE_USER".to_string()
}

fn default_role_description() -> String {
    "default user role".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn max_page_size() -> u32 {
    100
}

/// Argon2id cost for stored passwords.
///
/// Defaults follow the `argon2` crate (19 MiB, 2 passes, 1 lane).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordHashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordHashingConfig {
    pub fn params(&self) -> Result<argon2::Params, argon2::Error> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
    }
}

fn default_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}
