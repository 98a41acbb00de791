use std::collections::BTreeSet;

use axum::http::HeaderMap;
use serde::Serialize;

use super::AuthError;
use crate::{authz::roles::role_set, config::AuthConfig};

/// The caller of a request: who they are and which roles they hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Verified subject (username). `None` for anonymous callers.
    pub subject: Option<String>,
    pub email: Option<String>,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }

    /// Resolve the principal from trusted proxy headers.
    ///
    /// Without an identity header the caller is anonymous and any roles
    /// header is ignored, so anonymous callers never satisfy a mapping. The
    /// roles header may be a JSON array or a comma-separated list.
    pub fn from_headers(headers: &HeaderMap, config: &AuthConfig) -> Result<Self, AuthError> {
        let Some(subject) = header_str(headers, &config.identity_header)?
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(Self::anonymous());
        };

        let email = match &config.email_header {
            Some(name) => header_str(headers, name)?.map(str::to_string),
            None => None,
        };

        let roles = header_str(headers, &config.roles_header)?
            .map(|v| match serde_json::from_str::<Vec<String>>(v) {
                Ok(list) => role_set(list),
                Err(_) => role_set(v.split(',')),
            })
            .unwrap_or_default();

        Ok(Self {
            subject: Some(subject.to_string()),
            email,
            roles,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AuthError> {
    headers
        .get(name)
        .map(|v| v.to_str().map_err(|_| AuthError::InvalidHeader(name.to_string())))
        .transpose()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_comma_separated_roles() {
        let config = AuthConfig::default();
        let p = Principal::from_headers(
            &headers(&[
                ("x-forwarded-user", "alice"),
                ("x-forwarded-roles", "ROLE_USER, ROLE_ADMIN,,"),
            ]),
            &config,
        )
        .unwrap();

        assert_eq!(p.subject.as_deref(), Some("alice"));
        assert_eq!(p.roles, role_set(["ROLE_USER", "ROLE_ADMIN"]));
    }

    #[test]
    fn test_json_array_roles() {
        let config = AuthConfig::default();
        let p = Principal::from_headers(
            &headers(&[
                ("x-forwarded-user", "alice"),
                ("x-forwarded-roles", r#"["ROLE_USER","ROLE_OPS"]"#),
            ]),
            &config,
        )
        .unwrap();
        assert_eq!(p.roles, role_set(["ROLE_USER", "ROLE_OPS"]));
    }

    #[test]
    fn test_missing_identity_is_anonymous_and_roleless() {
        let config = AuthConfig::default();
        let p = Principal::from_headers(&headers(&[("x-forwarded-roles", "ROLE_ADMIN")]), &config)
            .unwrap();
        assert!(!p.is_authenticated());
        assert!(p.roles.is_empty());
    }

    #[test]
    fn test_email_header_is_optional() {
        let config = AuthConfig {
            email_header: Some("X-Forwarded-Email".into()),
            ..AuthConfig::default()
        };
        let p = Principal::from_headers(
            &headers(&[
                ("x-forwarded-user", "alice"),
                ("x-forwarded-email", "alice@example.com"),
            ]),
            &config,
        )
        .unwrap();
        assert_eq!(p.email.as_deref(), Some("alice@example.com"));
        assert!(p.roles.is_empty());
    }

    #[test]
    fn test_non_ascii_header_is_rejected() {
        let mut map = HeaderMap::new();
        map.insert(
            "x-forwarded-user",
            HeaderValue::from_bytes(b"al\xffce").unwrap(),
        );
        let err = Principal::from_headers(&map, &AuthConfig::default()).unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader(_)));
    }
}
