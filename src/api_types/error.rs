use serde::{Deserialize, Serialize};

/// JSON error envelope shared by every endpoint:
/// `{"error": {"type": "...", "message": "...", "code": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error classification, e.g. "not_found", "conflict", "forbidden".
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    /// Machine-readable detail code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                code: None,
            },
        }
    }

    pub fn with_code(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                code: Some(code.into()),
            },
        }
    }

    /// The body returned for every authorization denial. Deliberately says
    /// nothing about which mapping or roles were involved.
    pub fn forbidden() -> Self {
        Self::new("forbidden", "Forbidden")
    }
}
