use std::{sync::Arc, time::Duration};

use axum::{Router, http::StatusCode, routing::get};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    authz::{DecisionEngine, MappingRegistry, MappingStore},
    config::WardenConfig,
    db::Repos,
    gateway::{CredentialRelay, GatewayProxy, InMemoryTokenStore},
    idp::{IdentityProvider, KeycloakClient, NoopIdentityProvider},
    middleware, routes,
    services::Services,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WardenConfig>,
    /// The live mapping registry. Shared by the engine and the resource
    /// service, which mirrors every resource change into it.
    pub registry: Arc<MappingRegistry>,
    pub engine: DecisionEngine,
    pub services: Services,
    pub proxy: Arc<GatewayProxy>,
    pub idp: Arc<dyn IdentityProvider>,
    /// Delegated-token store consulted by the credential relay.
    pub tokens: Arc<InMemoryTokenStore>,
}

impl AppState {
    pub async fn new(config: WardenConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_repos(config, Repos::in_memory()).await
    }

    /// Build state over existing repositories and load the registry from them.
    pub async fn with_repos(
        config: WardenConfig,
        repos: Repos,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let idp: Arc<dyn IdentityProvider> = if config.idp.enabled {
            let client = KeycloakClient::new(&config.idp)
                .map_err(|e| format!("Failed to build identity provider client: {e}"))?;
            tracing::info!(
                base_url = %config.idp.base_url,
                realm = %config.idp.realm,
                "Identity provider mirroring enabled"
            );
            Arc::new(client)
        } else {
            tracing::info!("Identity provider mirroring disabled");
            Arc::new(NoopIdentityProvider)
        };

        let registry = Arc::new(MappingRegistry::new());
        let store: Arc<dyn MappingStore> = registry.clone();
        let engine = DecisionEngine::new(store.clone(), config.authz.default_effect);
        let services = Services::new(repos, store, idp.clone(), &config);

        let loaded = services.resources.reload_registry().await?;
        tracing::info!(
            mappings = loaded,
            default_effect = config.authz.default_effect.as_str(),
            "Mapping registry loaded"
        );

        let tokens = Arc::new(InMemoryTokenStore::from_seeds(&config.gateway.tokens));
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.timeout_secs))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        let proxy = GatewayProxy::new(
            http_client,
            config.gateway.clone(),
            CredentialRelay::new(tokens.clone()),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            engine,
            services,
            proxy: Arc::new(proxy),
            idp,
            tokens,
        })
    }
}

pub fn build_app(config: &WardenConfig, state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .nest("/admin", routes::admin::get_admin_routes())
        .fallback(routes::gateway::forward)
        // Every route, the gateway fallback included, passes the enforcement point
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authz_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.timeout_secs),
        ))
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
