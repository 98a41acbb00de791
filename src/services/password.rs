//! Password hashing for locally stored credentials.
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`),
//! so the cost parameters travel with each hash and stay verifiable after the
//! configured cost changes.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
};
use thiserror::Error;

use crate::config::PasswordHashingConfig;

/// Longest password accepted for hashing.
pub const MAX_PASSWORD_LENGTH: usize = 512;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password exceeds {MAX_PASSWORD_LENGTH} bytes")]
    TooLong,

    #[error("Failed to hash password: {0}")]
    Hash(password_hash::Error),
}

/// One-way password hashing for stored credentials.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Whether `password` matches `stored`. Malformed stored hashes never match.
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Argon2id with configurable cost.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::default(), params),
        }
    }

    /// Build from config. Parameters are checked when the config is loaded;
    /// should they still be rejected here, the library defaults apply.
    pub fn from_config(config: &PasswordHashingConfig) -> Self {
        match config.params() {
            Ok(params) => Self::new(params),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid password hashing parameters, using defaults");
                Self::new(Params::default())
            }
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(PasswordError::TooLong);
        }
        let salt = SaltString::generate(&mut rand::thread_rng());
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(PasswordError::Hash)
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        if password.len() > MAX_PASSWORD_LENGTH {
            return false;
        }
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
