use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("Identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Identity provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Already exists in identity provider: {0}")]
    Conflict(String),

    #[error("Not found in identity provider: {0}")]
    NotFound(String),

    #[error("Invalid identity provider response: {0}")]
    InvalidResponse(String),
}

impl IdpError {
    /// Map an unsuccessful admin API response to an error, consuming the body.
    pub(super) async fn from_response(what: &str, response: reqwest::Response) -> Self {
        let status = response.status();
        match status.as_u16() {
            404 => Self::NotFound(what.to_string()),
            409 => Self::Conflict(what.to_string()),
            code => {
                let message = response
                    .text()
                    .await
                    .ok()
                    .filter(|body| !body.trim().is_empty())
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
                Self::Api {
                    status: code,
                    message,
                }
            }
        }
    }
}

pub type IdpResult<T> = Result<T, IdpError>;
