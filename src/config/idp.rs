use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Identity-provider admin API configuration (Keycloak realm admin REST).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdpConfig {
    /// Mirror user and role changes to the identity provider.
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the identity provider, e.g. `https://sso.example.com`.
    #[serde(default)]
    pub base_url: String,

    /// Realm holding the users and roles.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Bearer token for the admin API. Usually `${IDP_ADMIN_TOKEN}`.
    #[serde(default)]
    pub admin_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            realm: default_realm(),
            admin_token: String::new(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl IdpConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "idp.base_url is required when idp.enabled = true".into(),
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("idp.base_url is not a valid URL: {e}"))
        })?;
        if self.realm.trim().is_empty() {
            return Err(ConfigError::Validation("idp.realm cannot be empty".into()));
        }
        self.retry.validate()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_realm() -> String {
    "master".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Retry configuration for outbound identity-provider calls.
///
/// Retries on transport errors and on the listed status codes, with
/// exponential backoff and jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of retry attempts (not including the initial request).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Random jitter as a fraction of the delay (0.0-1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Validation(
                "idp.retry.jitter must be between 0.0 and 1.0".into(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "idp.retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        Ok(())
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.enabled && self.retryable_status_codes.contains(&status)
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);

        let jitter_range = capped * self.jitter;
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// A config that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

fn default_retryable_status_codes() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}
