//! Retry with exponential backoff for identity-provider admin calls.
//!
//! Transient failures (connection errors, timeouts, 429 and 5xx) are retried
//! according to [`RetryConfig`]. Everything else is returned on first sight.

use std::future::Future;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Whether a transport-level error is worth another attempt.
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect()
        || error.is_timeout()
        || error
            .status()
            .is_some_and(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
}

/// Run `make_request` until it yields a non-retryable result or the attempts
/// run out.
///
/// A response carrying a retryable status on the last attempt is returned as
/// is; callers still inspect the status.
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    operation: &str,
    make_request: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    if !config.enabled {
        return make_request().await;
    }

    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        let last = attempt + 1 >= max_attempts;

        match make_request().await {
            Ok(response) => {
                let status = response.status();
                if !last && config.should_retry_status(status.as_u16()) {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        status = %status,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Identity provider returned retryable status, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if attempt > 0 {
                    debug!(
                        operation,
                        status = %status,
                        attempt = attempt + 1,
                        "Identity provider call completed after retry"
                    );
                }
                return Ok(response);
            }
            Err(error) => {
                if !last && is_retryable_error(&error) {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        error = %error,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Identity provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if attempt > 0 {
                    warn!(
                        operation,
                        error = %error,
                        attempts = attempt + 1,
                        "Identity provider call failed after all retry attempts"
                    );
                }
                return Err(error);
            }
        }
    }
}
