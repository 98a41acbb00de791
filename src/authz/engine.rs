//! Request-time authorization decisions.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use serde::Serialize;

use super::{
    AuthzError,
    registry::{Mapping, MappingStore},
    roles,
};
use crate::config::PolicyEffect;

/// Effect applied when no mapping matches the request path.
///
/// Deny: only paths covered by a mapping (or listed as public) are reachable.
/// Override with `authz.default_effect` in the config file.
pub const DEFAULT_EFFECT: PolicyEffect = PolicyEffect::Deny;

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The first matching mapping's role check decided.
    Mapping,
    /// Nothing matched; the default effect decided.
    Default,
    /// Evaluation failed; resolved to deny.
    Error,
}

/// Result of an authorization check.
#[derive(Debug, Clone)]
pub struct Decision {
    pub granted: bool,
    pub reason: DecisionReason,
    /// Pattern of the mapping that decided, if any.
    pub pattern: Option<String>,
    pub priority: Option<i64>,
    /// Path variables captured by the deciding pattern.
    pub variables: HashMap<String, String>,
    /// Evaluation error that forced a deny.
    pub error: Option<AuthzError>,
}

impl Decision {
    fn by_mapping(mapping: &Mapping, granted: bool, variables: HashMap<String, String>) -> Self {
        Self {
            granted,
            reason: DecisionReason::Mapping,
            pattern: Some(mapping.pattern.clone()),
            priority: Some(mapping.priority),
            variables,
            error: None,
        }
    }

    fn by_default(effect: PolicyEffect) -> Self {
        Self {
            granted: effect.is_allow(),
            reason: DecisionReason::Default,
            pattern: None,
            priority: None,
            variables: HashMap::new(),
            error: None,
        }
    }

    fn on_error(mapping: &Mapping, error: AuthzError) -> Self {
        Self {
            granted: false,
            reason: DecisionReason::Error,
            pattern: Some(mapping.pattern.clone()),
            priority: Some(mapping.priority),
            variables: HashMap::new(),
            error: Some(error),
        }
    }

    /// Convert into a `Result`, for call sites that want `?`.
    pub fn require(&self) -> Result<(), AuthzError> {
        if self.granted {
            Ok(())
        } else {
            Err(AuthzError::access_denied("Forbidden"))
        }
    }
}

/// Walks the mapping registry and decides each request.
///
/// Stateless between calls. The only shared state is the registry, which is
/// read through a snapshot.
#[derive(Clone)]
pub struct DecisionEngine {
    registry: Arc<dyn MappingStore>,
    default_effect: PolicyEffect,
}

impl DecisionEngine {
    pub fn new(registry: Arc<dyn MappingStore>, default_effect: PolicyEffect) -> Self {
        Self {
            registry,
            default_effect,
        }
    }

    pub fn with_default_effect(registry: Arc<dyn MappingStore>) -> Self {
        Self::new(registry, DEFAULT_EFFECT)
    }

    pub fn default_effect(&self) -> PolicyEffect {
        self.default_effect
    }

    pub fn registry(&self) -> &Arc<dyn MappingStore> {
        &self.registry
    }

    /// Decide whether a caller holding `granted_roles` may access `path`.
    ///
    /// The first mapping whose pattern matches decides; later mappings are
    /// never consulted. `method` is recorded for diagnostics only, patterns
    /// are path-only.
    pub fn authorize(&self, path: &str, method: &str, granted_roles: &BTreeSet<String>) -> Decision {
        let snapshot = self.registry.snapshot();

        for entry in snapshot.iter() {
            let mapping = entry.mapping();
            let compiled = match entry.compiled() {
                Ok(p) => p,
                Err(e) => {
                    return self.fail_closed(
                        mapping,
                        path,
                        method,
                        AuthzError::invalid_pattern(&mapping.pattern, e.clone()),
                    );
                }
            };

            let result = compiled.matches(path);
            if !result.is_match {
                continue;
            }

            if let Err(e) = check_required_roles(mapping) {
                return self.fail_closed(mapping, path, method, e);
            }

            let granted = roles::authorize(granted_roles, &mapping.required_roles);
            tracing::debug!(
                pattern = %mapping.pattern,
                priority = mapping.priority,
                path,
                method,
                granted,
                "Mapping matched"
            );
            return Decision::by_mapping(mapping, granted, result.variables);
        }

        tracing::debug!(
            path,
            method,
            effect = self.default_effect.as_str(),
            "No mapping matched, applying default effect"
        );
        Decision::by_default(self.default_effect)
    }

    fn fail_closed(&self, mapping: &Mapping, path: &str, method: &str, error: AuthzError) -> Decision {
        tracing::warn!(
            pattern = %mapping.pattern,
            path,
            method,
            error = %error,
            "Mapping evaluation failed, denying request"
        );
        Decision::on_error(mapping, error)
    }
}

fn check_required_roles(mapping: &Mapping) -> Result<(), AuthzError> {
    if mapping.required_roles.iter().any(|r| r.trim().is_empty()) {
        return Err(AuthzError::Evaluation(format!(
            "mapping '{}' requires a blank role name",
            mapping.pattern
        )));
    }
    Ok(())
}
