use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

use crate::{
    AppState, build_app,
    config::{MappingConfig, RouteConfig},
    services::test_support::test_config,
};

const ADMIN: (&str, &str) = ("root", "ROLE_ADMIN");

struct TestApp {
    router: Router,
    upstream: MockServer,
}

impl TestApp {
    async fn new(mappings: Vec<MappingConfig>) -> Self {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/profile"))
            .and(header("authorization", "Bearer tok-alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "alice"})))
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("upstream"))
            .mount(&upstream)
            .await;

        let mut config = test_config();
        config.authz.mappings = mappings;
        config.gateway.routes = vec![RouteConfig {
            id: "user-service".into(),
            path_prefix: "/user".into(),
            upstream: upstream.uri(),
            strip_prefix: false,
            remove_headers: vec!["cookie".into()],
        }];
        config
            .gateway
            .tokens
            .insert("alice".into(), "tok-alice".into());

        let state = AppState::new(config.clone()).await.unwrap();
        Self {
            router: build_app(&config, state),
            upstream,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user, roles)) = caller {
            builder = builder
                .header("X-Forwarded-User", user)
                .header("X-Forwarded-Roles", roles);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create_role(&self, name: &str) -> String {
        let (status, body) = self
            .send("POST", "/admin/v1/roles", Some(ADMIN), Some(json!({"name": name})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["entity"]["id"].as_str().unwrap().to_string()
    }
}

fn admin_api_mapping() -> MappingConfig {
    MappingConfig {
        priority: 0,
        pattern: "/admin/v1/**".into(),
        roles: vec!["ROLE_ADMIN".into()],
    }
}

#[tokio::test]
async fn test_user_mapping_grants_and_denies_by_role() {
    let app = TestApp::new(vec![admin_api_mapping()]).await;
    let role_user = app.create_role("ROLE_USER").await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/v1/resources",
            Some(ADMIN),
            Some(json!({
                "name": "user area",
                "pattern": "/user/**",
                "priority": 1,
                "role_ids": [role_user],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["registry"]["status"], "applied");

    let (status, body) = app
        .send("GET", "/user/profile", Some(("alice", "ROLE_USER")), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "alice");

    let (status, body) = app
        .send("GET", "/user/profile", Some(("alice", "ROLE_GUEST")), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "forbidden");
    assert_eq!(body["error"]["message"], "Forbidden");
}

#[tokio::test]
async fn test_traversal_cannot_skip_a_mapping() {
    let app = TestApp::new(vec![
        MappingConfig {
            priority: 1,
            pattern: "/user/admin/**".into(),
            roles: vec!["ROLE_ADMIN".into()],
        },
        MappingConfig {
            priority: 2,
            pattern: "/user/**".into(),
            roles: vec!["ROLE_USER".into()],
        },
    ])
    .await;
    let caller = Some(("alice", "ROLE_USER"));

    let (status, _) = app.send("GET", "/user/admin/secret", caller, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("GET", "/user/%61dmin/secret", caller, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for uri in [
        "/user/x/../admin/secret",
        "/user/x/%2e%2e/admin/secret",
        "/user/x/%2E%2E/admin/secret",
        "/user/x%2f..%2fadmin/secret",
        "/user/admin;x=1/secret",
        "/user//admin/secret",
    ] {
        let (status, body) = app.send("GET", uri, caller, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], "invalid_path");
    }

    let (status, _) = app.send("GET", "/user/profile", caller, None).await;
    assert_eq!(status, StatusCode::OK);

    let received = app.upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/user/profile");
}

#[tokio::test]
async fn test_admin_area_denies_guest() {
    let app = TestApp::new(vec![MappingConfig {
        priority: 3,
        pattern: "/admin/**".into(),
        roles: vec!["ROLE_ADMIN".into()],
    }])
    .await;

    let (status, body) = app
        .send("GET", "/admin/dashboard", Some(("guest", "ROLE_GUEST")), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!body.to_string().contains("/admin/**"));
    assert!(!body.to_string().contains("ROLE_ADMIN"));
}

#[tokio::test]
async fn test_resource_role_update_applies_without_restart() {
    let app = TestApp::new(vec![admin_api_mapping()]).await;
    let role_admin = app.create_role("ROLE_ADMIN").await;
    let role_supervisor = app.create_role("ROLE_SUPERVISOR").await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/v1/resources",
            Some(ADMIN),
            Some(json!({
                "name": "admin area",
                "pattern": "/admin/**",
                "priority": 3,
                "role_ids": [role_admin],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let resource_id = body["entity"]["id"].as_str().unwrap().to_string();

    let supervisor = Some(("sam", "ROLE_SUPERVISOR"));
    let (status, _) = app.send("GET", "/admin/dashboard", supervisor, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/admin/v1/resources/{resource_id}"),
            Some(ADMIN),
            Some(json!({"role_ids": [role_admin, role_supervisor]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["entity"]["roles_added"], json!(["ROLE_SUPERVISOR"]));
    assert_eq!(body["entity"]["roles_removed"], json!([]));

    // /admin/v1/** (priority 0) still wins for the admin API itself
    let (status, _) = app.send("GET", "/admin/v1/roles", supervisor, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", "/admin/dashboard", supervisor, None).await;
    assert_ne!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_is_public_and_reports_registry() {
    let app = TestApp::new(vec![admin_api_mapping()]).await;

    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["mappings"], 1);
    assert_eq!(body["identity_provider"]["enabled"], false);
}

#[tokio::test]
async fn test_admin_api_requires_admin_role() {
    let app = TestApp::new(vec![admin_api_mapping()]).await;

    let (status, _) = app
        .send("GET", "/admin/v1/users", Some(("bob", "ROLE_USER")), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("GET", "/admin/v1/users", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_user_lifecycle_over_http() {
    let app = TestApp::new(vec![admin_api_mapping()]).await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/v1/users",
            Some(ADMIN),
            Some(json!({
                "username": "alice",
                "password": "correct horse battery",
                "email": "Alice@Example.com",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["entity"]["email"], "alice@example.com");
    assert_eq!(body["entity"]["roles"], json!(["ROLE_USER"]));
    assert_eq!(body["identity_provider"]["status"], "skipped");
    let id = body["entity"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            "POST",
            "/admin/v1/users",
            Some(ADMIN),
            Some(json!({
                "username": "alice",
                "password": "another password",
                "email": "other@example.com",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.create_role("ROLE_MANAGER").await;
    let (status, body) = app
        .send(
            "PUT",
            &format!("/admin/v1/users/{id}/roles/ROLE_MANAGER"),
            Some(ADMIN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["entity"]["roles"], json!(["ROLE_MANAGER", "ROLE_USER"]));

    let (status, body) = app
        .send(
            "GET",
            "/admin/v1/users?roles=ROLE_MANAGER",
            Some(ADMIN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _) = app
        .send("DELETE", &format!("/admin/v1/users/{id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send("GET", &format!("/admin/v1/users/{id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["request_id"].is_string());
}

#[tokio::test]
async fn test_invalid_resource_pattern_is_rejected() {
    let app = TestApp::new(vec![admin_api_mapping()]).await;

    let (status, _) = app
        .send(
            "POST",
            "/admin/v1/resources",
            Some(ADMIN),
            Some(json!({"name": "broken", "pattern": "/users/{id", "priority": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send("GET", "/admin/v1/mappings", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["pattern"], "/admin/v1/**");
    assert_eq!(body[0]["required_roles"], json!(["ROLE_ADMIN"]));
}
