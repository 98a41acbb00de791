//! Path-based, role-gated authorization.
//!
//! The authorization flow:
//! 1. The enforcement point resolves the caller's granted roles
//! 2. [`DecisionEngine`] takes a snapshot of the [`MappingRegistry`]
//! 3. Mappings are scanned in ascending priority order
//! 4. The first mapping whose pattern matches the path decides, by role intersection
//! 5. No match falls back to the configured default effect ([`DEFAULT_EFFECT`] unless overridden)
//!
//! Any failure while evaluating a mapping resolves to deny. Paths are
//! canonicalized by [`path::canonicalize`] before any of this runs.

mod engine;
mod error;
pub mod path;
pub mod pattern;
mod registry;
pub mod roles;

pub use engine::{DEFAULT_EFFECT, Decision, DecisionEngine, DecisionReason};
pub use error::AuthzError;
pub use path::{CanonicalPath, PathError};
pub use pattern::{MatchResult, PathPattern, PatternError};
pub use registry::{CompiledMapping, Mapping, MappingRegistry, MappingSnapshot, MappingStore};

/// Whether `path` matches any of `patterns`.
///
/// Used for public-path bypass lists. Malformed patterns never match.
pub fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|p| {
        pattern::matches(p, path)
            .map(|r| r.is_match)
            .unwrap_or(false)
    })
}
