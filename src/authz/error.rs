//! Authorization errors.

use thiserror::Error;

use super::pattern::PatternError;

#[derive(Debug, Clone, Error)]
pub enum AuthzError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("Mapping evaluation error: {0}")]
    Evaluation(String),
}

impl AuthzError {
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied(reason.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>, source: PatternError) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}
