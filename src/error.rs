use std::time::Duration;
use thiserror::Error;

/// Errors produced by clients, pools and the retry parser.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The caller supplied input the operation cannot work with
    /// (e.g. a conversation with fewer than two turns).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every decode attempt failed and the retry budget is spent.
    ///
    /// `message` is the text of the last decode error.
    #[error("failed to parse response after {attempts} attempts: {message}")]
    ParseExhausted {
        /// Total decode attempts made (`max_retries + 1`).
        attempts: u32,
        /// The last decode error's message.
        message: String,
    },

    /// Low-level HTTP transport failure (connection refused, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON handling of a provider payload failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 529).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The operation was abandoned because its [`Cancellation`](crate::cancel::Cancellation) fired.
    #[error("Operation was cancelled")]
    Cancelled,

    /// A deadline elapsed before the operation completed.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The client pool was closed while (or before) waiting for a handle.
    #[error("Client pool is closed")]
    PoolClosed,

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl HarnessError {
    /// Whether this error came from the completion service itself
    /// (transport, auth, quota, malformed provider payload).
    ///
    /// Service errors are never retried by [`RetryParser`](crate::retry::RetryParser).
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            HarnessError::Request(_)
                | HarnessError::HttpError { .. }
                | HarnessError::Json(_)
                | HarnessError::Other(_)
        )
    }
}

impl From<anyhow::Error> for HarnessError {
    fn from(err: anyhow::Error) -> Self {
        HarnessError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
