use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use validator::ValidationError;

use crate::authz::PathPattern;

/// Role names: letters, digits, underscore, dash, dot and colon.
/// Examples: "ROLE_USER", "billing:read", "ops-admin"
pub static ROLE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:\-]+$").expect("role name pattern is valid"));

/// Usernames: lowercase-insensitive letters, digits and `._-`.
pub static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._\-]+$").expect("username pattern is valid"));

/// E.164-ish phone numbers: optional `+`, then 6 to 15 digits.
pub static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("phone pattern is valid"));

const MAX_ROLE_LENGTH: usize = 64;

const HTTP_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "*",
];

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(error("empty_role", "Role names cannot be empty or whitespace-only"));
    }
    if name.len() > MAX_ROLE_LENGTH {
        return Err(error(
            "role_too_long",
            format!("Role names cannot exceed {MAX_ROLE_LENGTH} characters"),
        ));
    }
    if !ROLE_NAME_REGEX.is_match(name) {
        return Err(error(
            "invalid_role_name",
            "Role names may only contain letters, digits, '_', '-', '.' and ':'",
        ));
    }
    Ok(())
}

/// Resource patterns must compile as Ant-style path patterns and be absolute.
pub fn validate_pattern(pattern: &str) -> Result<(), ValidationError> {
    if !pattern.starts_with('/') {
        return Err(error("relative_pattern", "Patterns must start with '/'"));
    }
    PathPattern::parse(pattern)
        .map(|_| ())
        .map_err(|e| error("invalid_pattern", e.to_string()))
}

pub fn validate_http_method(method: &str) -> Result<(), ValidationError> {
    if HTTP_METHODS.contains(&method.to_ascii_uppercase().as_str()) {
        Ok(())
    } else {
        Err(error(
            "invalid_http_method",
            format!("Unsupported HTTP method '{method}'"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert!(validate_role_name("ROLE_USER").is_ok());
        assert!(validate_role_name("billing:read").is_ok());
        assert!(validate_role_name(" ").is_err());
        assert!(validate_role_name("has space").is_err());
        assert!(validate_role_name(&"R".repeat(65)).is_err());
    }

    #[test]
    fn test_patterns() {
        assert!(validate_pattern("/admin/**").is_ok());
        assert!(validate_pattern("/users/{id}").is_ok());
        assert!(validate_pattern("admin/**").is_err());
        assert!(validate_pattern("/users/{id").is_err());
    }

    #[test]
    fn test_http_methods() {
        assert!(validate_http_method("get").is_ok());
        assert!(validate_http_method("*").is_ok());
        assert!(validate_http_method("FETCH").is_err());
    }
}
