use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Route forwarding to downstream services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Forward unmatched (non-admin) requests to the configured routes.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Delegated tokens preloaded into the token store, keyed by principal.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            routes: Vec::new(),
            tokens: HashMap::new(),
        }
    }
}

impl GatewayConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for route in &self.routes {
            route.validate()?;
            if !seen.insert(route.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate gateway route id '{}'",
                    route.id
                )));
            }
        }
        Ok(())
    }

    /// Find the route for `path`. The longest matching prefix wins.
    pub fn route_for(&self, path: &str) -> Option<&RouteConfig> {
        self.routes
            .iter()
            .filter(|r| r.matches(path))
            .max_by_key(|r| r.normalized_prefix().len())
    }
}

/// One downstream route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Route identifier used in logs.
    pub id: String,

    /// Path prefix, e.g. `/user-service`.
    pub path_prefix: String,

    /// Upstream base URL, e.g. `http://user-service:8081`.
    pub upstream: String,

    /// Strip `path_prefix` before forwarding.
    #[serde(default = "default_true")]
    pub strip_prefix: bool,

    /// Request headers removed before forwarding.
    #[serde(default = "default_remove_headers")]
    pub remove_headers: Vec<String>,
}

impl RouteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Validation("Gateway route id cannot be empty".into()));
        }
        if !self.path_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "Gateway route '{}': path_prefix must start with '/'",
                self.id
            )));
        }
        url::Url::parse(&self.upstream).map_err(|e| {
            ConfigError::Validation(format!(
                "Gateway route '{}': invalid upstream URL: {e}",
                self.id
            ))
        })?;
        for header in &self.remove_headers {
            http::HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
                ConfigError::Validation(format!(
                    "Gateway route '{}': invalid header name '{header}'",
                    self.id
                ))
            })?;
        }
        Ok(())
    }

    fn normalized_prefix(&self) -> &str {
        self.path_prefix.trim_end_matches('/')
    }

    /// Prefix match on whole segments: `/user-service` matches
    /// `/user-service` and `/user-service/x`, not `/user-services`.
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.normalized_prefix();
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
            None => false,
        }
    }

    /// Path sent upstream.
    pub fn upstream_path<'a>(&self, path: &'a str) -> std::borrow::Cow<'a, str> {
        if !self.strip_prefix {
            return path.into();
        }
        match path.strip_prefix(self.normalized_prefix()) {
            Some("") | None => "/".into(),
            Some(rest) if rest.starts_with('/') => rest.into(),
            Some(rest) => format!("/{rest}").into(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_remove_headers() -> Vec<String> {
    vec!["cookie".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(prefix: &str, strip: bool) -> RouteConfig {
        RouteConfig {
            id: "users".into(),
            path_prefix: prefix.into(),
            upstream: "http://users:8081".into(),
            strip_prefix: strip,
            remove_headers: default_remove_headers(),
        }
    }

    #[test]
    fn test_prefix_matches_whole_segments() {
        let r = route("/user-service", true);
        assert!(r.matches("/user-service"));
        assert!(r.matches("/user-service/users/1"));
        assert!(!r.matches("/user-services/x"));
        assert!(!r.matches("/order-service/x"));
    }

    #[test]
    fn test_strip_prefix() {
        let r = route("/user-service/", true);
        assert_eq!(r.upstream_path("/user-service/users/1"), "/users/1");
        assert_eq!(r.upstream_path("/user-service"), "/");
        assert_eq!(route("/user-service", false).upstream_path("/user-service/a"), "/user-service/a");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = GatewayConfig {
            enabled: true,
            routes: vec![route("/api", true), {
                let mut r = route("/api/orders", true);
                r.id = "orders".into();
                r
            }],
            tokens: HashMap::new(),
        };

        assert_eq!(config.route_for("/api/orders/7").map(|r| r.id.as_str()), Some("orders"));
        assert_eq!(config.route_for("/api/users").map(|r| r.id.as_str()), Some("users"));
        assert!(config.route_for("/other").is_none());
    }
}
