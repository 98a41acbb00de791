//! Request path canonicalization.
//!
//! Authorization decides on the canonical form of a path, and the gateway
//! forwards the raw form unchanged. The two must mean the same thing to every
//! server downstream, so any path that a URL resolver or servlet container
//! could read differently is rejected instead of normalized:
//!
//! - `.` and `..` segments, literal or percent-encoded
//! - encoded `/` or `\`, a literal `\`, and encoded `%` (double encoding)
//! - `;` path parameters, which some servers strip before routing
//! - empty interior segments (`//`)
//! - control characters and escapes that do not decode to UTF-8

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Path must start with '/'")]
    NotAbsolute,

    #[error("Path contains an empty segment")]
    EmptySegment,

    #[error("Path contains a dot segment")]
    DotSegment,

    #[error("Path contains a disallowed character")]
    DisallowedCharacter,

    #[error("Path is not valid percent-encoded UTF-8")]
    InvalidEncoding,
}

/// Bytes escaped when a canonical path goes back on the wire.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Request extension holding the path the enforcement point authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath(pub String);

/// Percent-decode `raw` and check it can be authorized as-is.
///
/// Returns the decoded path, segment boundaries preserved.
pub fn canonicalize(raw: &str) -> Result<String, PathError> {
    let Some(rest) = raw.strip_prefix('/') else {
        return Err(PathError::NotAbsolute);
    };
    if rest.is_empty() {
        return Ok("/".to_string());
    }

    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    let mut canonical = String::with_capacity(raw.len());

    for (index, segment) in segments.iter().enumerate() {
        canonical.push('/');
        if segment.is_empty() {
            // A single trailing slash is fine; `//` anywhere is not.
            if index == last {
                continue;
            }
            return Err(PathError::EmptySegment);
        }

        let decoded = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| PathError::InvalidEncoding)?;
        if decoded == "." || decoded == ".." {
            return Err(PathError::DotSegment);
        }
        if segment.contains(['\\', ';'])
            || decoded
                .chars()
                .any(|c| matches!(c, '/' | '\\' | '%' | ';') || c.is_control())
        {
            return Err(PathError::DisallowedCharacter);
        }
        canonical.push_str(&decoded);
    }

    Ok(canonical)
}

/// Percent-encode a canonical path for the wire. Decoding the result with
/// [`canonicalize`] yields `path` again.
pub fn encode(path: &str) -> String {
    utf8_percent_encode(path, PATH_SET).to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("/", "/")]
    #[case("/user/profile", "/user/profile")]
    #[case("/user/profile/", "/user/profile/")]
    #[case("/files/a%20b.txt", "/files/a b.txt")]
    #[case("/svc/%61dmin/secret", "/svc/admin/secret")]
    #[case("/v1/.well-known/x", "/v1/.well-known/x")]
    #[case("/a/..b/c", "/a/..b/c")]
    fn test_accepts_and_decodes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(canonicalize(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("/svc/x/../admin/secret", PathError::DotSegment)]
    #[case("/svc/./admin", PathError::DotSegment)]
    #[case("/svc/x/%2e%2e/admin/secret", PathError::DotSegment)]
    #[case("/svc/x/%2E./admin", PathError::DotSegment)]
    #[case("/svc/..", PathError::DotSegment)]
    #[case("/svc/admin%2fsecret", PathError::DisallowedCharacter)]
    #[case("/svc/admin%5Csecret", PathError::DisallowedCharacter)]
    #[case("/svc/admin\\secret", PathError::DisallowedCharacter)]
    #[case("/svc/%252e%252e/admin", PathError::DisallowedCharacter)]
    #[case("/svc/admin;jsessionid=1/secret", PathError::DisallowedCharacter)]
    #[case("/svc/admin%3Bx/secret", PathError::DisallowedCharacter)]
    #[case("/svc/%00", PathError::DisallowedCharacter)]
    #[case("/svc//admin", PathError::EmptySegment)]
    #[case("/svc/%ff", PathError::InvalidEncoding)]
    #[case("svc/admin", PathError::NotAbsolute)]
    fn test_rejects_ambiguous_paths(#[case] raw: &str, #[case] expected: PathError) {
        assert_eq!(canonicalize(raw).unwrap_err(), expected);
    }

    #[rstest]
    #[case("/files/a b.txt", "/files/a%20b.txt")]
    #[case("/svc/admin/secret", "/svc/admin/secret")]
    #[case("/caf\u{e9}/menu", "/caf%C3%A9/menu")]
    fn test_encode_round_trips_through_canonicalize(#[case] canonical: &str, #[case] wire: &str) {
        assert_eq!(encode(canonical), wire);
        assert_eq!(canonicalize(wire).unwrap(), canonical);
    }
}
