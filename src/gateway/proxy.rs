use axum::{
    Json,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::CredentialRelay;
use crate::{
    api_types::ErrorResponse,
    auth::Principal,
    authz::{CanonicalPath, path},
    config::{GatewayConfig, RouteConfig},
};

/// Connection-scoped headers never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Response extension marking a response that came from an upstream service.
///
/// Later layers must treat these bodies as opaque.
#[derive(Debug, Clone)]
pub struct Forwarded {
    pub route: String,
}

/// Reverse proxy over the configured gateway routes.
#[derive(Clone)]
pub struct GatewayProxy {
    client: reqwest::Client,
    config: GatewayConfig,
    relay: CredentialRelay,
}

impl GatewayProxy {
    pub fn new(client: reqwest::Client, config: GatewayConfig, relay: CredentialRelay) -> Self {
        Self {
            client,
            config,
            relay,
        }
    }

    /// Upstream URL for the canonical `path`, re-encoded so the upstream
    /// decodes exactly the path that was authorized.
    fn upstream_url(route: &RouteConfig, path: &str, request: &Request<Body>) -> String {
        let path = path::encode(&route.upstream_path(path));
        let base = route.upstream.trim_end_matches('/');
        match request.uri().query() {
            Some(query) => format!("{base}{path}?{query}"),
            None => format!("{base}{path}"),
        }
    }

    /// Forward `request` to the route matching its path.
    ///
    /// No matching route is a 404; an unreachable upstream is a 502. Upstream
    /// error statuses are passed through unchanged.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let canonical = match request.extensions().get::<CanonicalPath>() {
            Some(CanonicalPath(canonical)) => Ok(canonical.clone()),
            None => path::canonicalize(request.uri().path()),
        };
        let Ok(canonical) = canonical else {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_code(
                    "invalid_request",
                    "invalid_path",
                    "Request path is not allowed",
                )),
            )
                .into_response();
        };

        let Some(route) = self.config.route_for(&canonical) else {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("not_found", "No route matches this path")),
            )
                .into_response();
        };

        let url = Self::upstream_url(route, &canonical, &request);
        let principal = request.extensions().get::<Principal>().cloned();
        let (parts, body) = request.into_parts();

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        for name in &route.remove_headers {
            headers.remove(name.as_str());
        }
        self.relay.apply(principal.as_ref(), &mut headers).await;

        debug!(route = %route.id, method = %parts.method, %url, "Forwarding request");

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await;

        let upstream = match upstream {
            Ok(response) => response,
            Err(e) => {
                warn!(route = %route.id, %url, error = %e, "Upstream request failed");
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse::new("bad_gateway", "Upstream service unavailable")),
                )
                    .into_response();
            }
        };

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        response.extensions_mut().insert(Forwarded {
            route: route.id.clone(),
        });
        response
    }
}
