//! Reporting for mutations that fan out to the registry and the identity
//! provider.

use std::future::Future;

use serde::Serialize;
use tracing::warn;

use crate::idp::{IdentityProvider, IdpResult};

/// What happened to one mirror of a local change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MirrorStatus {
    Applied,
    /// The mirror does not apply to this change, or is disabled.
    Skipped,
    /// The local change stands; the mirror is out of date.
    Failed { error: String },
}

impl MirrorStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Combine two steps of the same mirror. The first failure wins.
    pub fn and(self, next: MirrorStatus) -> MirrorStatus {
        match (self, next) {
            (failed @ Self::Failed { .. }, _) => failed,
            (_, failed @ Self::Failed { .. }) => failed,
            (Self::Applied, _) | (_, Self::Applied) => Self::Applied,
            _ => Self::Skipped,
        }
    }
}

/// A committed local change plus the state of its mirrors.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome<T> {
    pub entity: T,
    pub registry: MirrorStatus,
    pub identity_provider: MirrorStatus,
}

impl<T> MutationOutcome<T> {
    pub fn new(entity: T, registry: MirrorStatus, identity_provider: MirrorStatus) -> Self {
        Self {
            entity,
            registry,
            identity_provider,
        }
    }

    /// True when the local change succeeded but a mirror did not.
    pub fn is_partial(&self) -> bool {
        self.registry.is_failed() || self.identity_provider.is_failed()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MutationOutcome<U> {
        MutationOutcome {
            entity: f(self.entity),
            registry: self.registry,
            identity_provider: self.identity_provider,
        }
    }
}

/// Await an identity-provider call and record its result.
///
/// The call is dropped unpolled when the provider is disabled. Failures are
/// logged and reported, never propagated.
pub(crate) async fn mirror(
    idp: &dyn IdentityProvider,
    operation: &'static str,
    call: impl Future<Output = IdpResult<()>>,
) -> MirrorStatus {
    if !idp.is_enabled() {
        return MirrorStatus::Skipped;
    }
    match call.await {
        Ok(()) => MirrorStatus::Applied,
        Err(e) => {
            warn!(operation, error = %e, "Identity provider mirroring failed, local change kept");
            MirrorStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(msg: &str) -> MirrorStatus {
        MirrorStatus::Failed { error: msg.into() }
    }

    #[test]
    fn test_and_keeps_first_failure() {
        assert_eq!(failed("a").and(failed("b")), failed("a"));
        assert_eq!(MirrorStatus::Applied.and(failed("b")), failed("b"));
        assert_eq!(MirrorStatus::Skipped.and(MirrorStatus::Applied), MirrorStatus::Applied);
        assert_eq!(MirrorStatus::Skipped.and(MirrorStatus::Skipped), MirrorStatus::Skipped);
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = MutationOutcome::new(1, MirrorStatus::Applied, failed("timeout"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["entity"], 1);
        assert_eq!(json["registry"]["status"], "applied");
        assert_eq!(json["identity_provider"]["status"], "failed");
        assert_eq!(json["identity_provider"]["error"], "timeout");
        assert!(outcome.is_partial());
    }
}
