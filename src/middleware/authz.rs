//! Enforcement point for path authorization.
//!
//! Runs in front of every route, admin and gateway alike. The path is
//! canonicalized first and ambiguous paths are rejected with 400. Public paths
//! then pass straight through; everything else is decided by the
//! [`DecisionEngine`] against the caller's granted roles.
//!
//! [`DecisionEngine`]: crate::authz::DecisionEngine

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api_types::ErrorResponse,
    auth::{AuthError, Principal},
    authz::{CanonicalPath, Decision, DecisionReason, matches_any, path::canonicalize},
};

pub async fn authz_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let config = &state.config;
    let path = match canonicalize(req.uri().path()) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "Rejected request path");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_code(
                    "invalid_request",
                    "invalid_path",
                    "Request path is not allowed",
                )),
            )
                .into_response();
        }
    };
    req.extensions_mut().insert(CanonicalPath(path.clone()));

    if matches_any(&config.authz.public_paths, &path) {
        // Public paths still carry whatever identity is present so the relay
        // can use it, but a malformed header never blocks them.
        let principal =
            Principal::from_headers(req.headers(), &config.auth).unwrap_or_default();
        req.extensions_mut().insert(principal);
        return next.run(req).await;
    }

    let principal = match Principal::from_headers(req.headers(), &config.auth) {
        Ok(principal) => principal,
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "Rejected identity headers");
            return e.into_response();
        }
    };

    if config.auth.require_identity && !principal.is_authenticated() {
        return AuthError::MissingIdentity.into_response();
    }

    if config.authz.enabled {
        let method = req.method().as_str().to_string();
        let decision = state.engine.authorize(&path, &method, &principal.roles);
        audit(&state, &principal, &method, &path, &decision);

        if !decision.granted {
            return (StatusCode::FORBIDDEN, Json(ErrorResponse::forbidden())).into_response();
        }
    }

    req.extensions_mut().insert(principal);
    next.run(req).await
}

fn audit(state: &AppState, principal: &Principal, method: &str, path: &str, decision: &Decision) {
    let audit = &state.config.authz.audit;
    let subject = principal.subject.as_deref().unwrap_or("anonymous");
    let pattern = decision.pattern.as_deref().unwrap_or("-");
    let reason = match decision.reason {
        DecisionReason::Mapping => "mapping",
        DecisionReason::Default => "default",
        DecisionReason::Error => "error",
    };

    if decision.granted && audit.log_allowed {
        tracing::info!(
            target: "warden::audit",
            subject,
            method,
            path,
            pattern,
            reason,
            "Access granted"
        );
    } else if !decision.granted && audit.log_denied {
        // Evaluation errors were already logged at warn by the engine.
        tracing::info!(
            target: "warden::audit",
            subject,
            method,
            path,
            pattern,
            reason,
            roles = ?principal.roles,
            "Access denied"
        );
    }
}

#[cfg(test)]
mod tests {
    use axum::{Extension, Router, body::Body, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{MappingConfig, WardenConfig};

    async fn app(configure: impl FnOnce(&mut WardenConfig)) -> Router {
        let mut config = WardenConfig::default();
        config.authz.mappings = vec![
            MappingConfig {
                priority: 1,
                pattern: "/user/**".into(),
                roles: vec!["ROLE_USER".into()],
            },
            MappingConfig {
                priority: 2,
                pattern: "/open/**".into(),
                roles: vec![],
            },
        ];
        configure(&mut config);
        let state = AppState::new(config).await.unwrap();

        Router::new()
            .route(
                "/{*rest}",
                get(|Extension(p): Extension<Principal>| async move {
                    p.subject.unwrap_or_else(|| "anonymous".into())
                }),
            )
            .route(
                "/health",
                get(|Extension(p): Extension<Principal>| async move {
                    p.subject.unwrap_or_else(|| "anonymous".into())
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                authz_middleware,
            ))
            .with_state(state)
    }

    fn get_as(path: &str, user: Option<&str>, roles: &str) -> Request {
        let mut builder = axum::http::Request::get(path);
        if let Some(user) = user {
            builder = builder.header("X-Forwarded-User", user);
        }
        builder
            .header("X-Forwarded-Roles", roles)
            .body(Body::empty())
            .unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_grant_inserts_principal() {
        let response = app(|_| {})
            .await
            .oneshot(get_as("/user/profile", Some("alice"), "ROLE_USER"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "alice");
    }

    #[tokio::test]
    async fn test_deny_is_generic_403() {
        let response = app(|_| {})
            .await
            .oneshot(get_as("/user/profile", Some("bob"), "ROLE_GUEST"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body, serde_json::to_value(ErrorResponse::forbidden()).unwrap());
    }

    #[tokio::test]
    async fn test_unmapped_path_uses_default_effect() {
        let denied = app(|_| {})
            .await
            .oneshot(get_as("/elsewhere", Some("alice"), "ROLE_USER"))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let allowed = app(|c| c.authz.default_effect = crate::config::PolicyEffect::Allow)
            .await
            .oneshot(get_as("/elsewhere", Some("alice"), "ROLE_USER"))
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_anonymous_roles_header_is_ignored() {
        let response = app(|_| {})
            .await
            .oneshot(get_as("/user/profile", None, "ROLE_USER"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_empty_role_mapping_needs_some_role() {
        let granted = app(|_| {})
            .await
            .oneshot(get_as("/open/thing", Some("alice"), "ROLE_GUEST"))
            .await
            .unwrap();
        assert_eq!(granted.status(), StatusCode::OK);

        let denied = app(|_| {})
            .await
            .oneshot(get_as("/open/thing", Some("alice"), ""))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_public_paths_bypass() {
        let response = app(|_| {})
            .await
            .oneshot(get_as("/health", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_require_identity_is_401() {
        let response = app(|c| c.auth.require_identity = true)
            .await
            .oneshot(get_as("/user/profile", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_disabled_authz_allows_everything() {
        let response = app(|c| c.authz.enabled = false)
            .await
            .oneshot(get_as("/elsewhere", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dot_segments_are_rejected_before_public_bypass() {
        for path in ["/health/../user/profile", "/health/%2e%2e/user/profile"] {
            let response = app(|_| {})
                .await
                .oneshot(get_as(path, Some("mallory"), "ROLE_GUEST"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
            let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
            assert_eq!(body["error"]["code"], "invalid_path");
        }
    }

    #[tokio::test]
    async fn test_encoded_segments_are_authorized_decoded() {
        let response = app(|_| {})
            .await
            .oneshot(get_as("/%75ser/profile", Some("bob"), "ROLE_GUEST"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
