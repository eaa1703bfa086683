use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single translation backend request.
///
/// The retry loop inspects these to decide whether another attempt is worth
/// making. Every variant is request-level: one error fails the whole batch.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a non-success HTTP status
    #[error("Translation API error ({status}): {body}")]
    Http { status: u16, body: String },

    /// The attempt did not finish within the per-attempt timeout
    #[error("Translation request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure (DNS, TLS, reset, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed or had an unexpected shape
    #[error("Malformed translation response: {0}")]
    Malformed(String),

    /// The backend returned an explicit `{ "error": ... }` body
    #[error("Translation service error: {0}")]
    Service(String),

    /// The response parsed but did not match the request (key sets, lengths)
    #[error("Translation response failed validation: {0}")]
    Validation(String),

}

impl BackendError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// 429 and 5xx are retried, other 4xx are not. Timeouts, network errors and
    /// malformed or invalid responses share the transient retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http { status, .. } => *status == 429 || *status >= 500,
            BackendError::Timeout(_)
            | BackendError::Network(_)
            | BackendError::Malformed(_)
            | BackendError::Service(_)
            | BackendError::Validation(_) => true,
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            BackendError::Timeout(timeout)
        } else if error.is_decode() {
            BackendError::Malformed(error.to_string())
        } else {
            BackendError::Network(error.to_string())
        }
    }
}
