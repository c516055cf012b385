//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait is the completion service: given a conversation it
//! returns generated text continuing it. Built-in implementations:
//! [`AnthropicBackend`] (HTTP) and [`MockBackend`] (canned responses).
//!
//! ## Architecture
//!
//! ```text
//! RetryParser / caller ──► Client::complete() ──► with_backoff() ──► Backend::complete()
//!                                                                        │
//!                                                             ┌──────────┴──────────┐
//!                                                      AnthropicBackend         MockBackend
//!                                                        /v1/messages        canned responses
//! ```

pub mod anthropic;
pub mod backoff;
pub mod mock;

pub use anthropic::AnthropicBackend;
pub use backoff::BackoffConfig;
pub use mock::MockBackend;

use crate::conversation::Turn;
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for the callback invoked before each transport retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

/// A normalized completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier (e.g. `"claude-3-haiku-20240307"`).
    pub model: String,
    /// The full conversation, oldest turn first. A trailing assistant turn
    /// is a prefill the model continues.
    pub turns: Vec<Turn>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 = greedy).
    pub temperature: f64,
}

/// A normalized completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated continuation.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (usage, stop reason, model).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over completion providers.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute one completion request.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Check whether a [`HarnessError`] is retryable based on the backoff config.
///
/// Retryable conditions:
/// - [`HarnessError::HttpError`] with a status in `config.retryable_statuses`
/// - [`HarnessError::Request`] (connection/transport errors)
pub fn is_retryable(error: &HarnessError, config: &BackoffConfig) -> bool {
    match error {
        HarnessError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        HarnessError::Request(_) => true,
        _ => false,
    }
}

/// Execute a backend call with transport-level retry and exponential backoff.
///
/// Only transport failures are retried, and only as many times as
/// `config.max_retries` allows (zero with [`BackoffConfig::none`]). Returns the
/// first successful response, or the last error.
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &CompletionRequest,
    config: &BackoffConfig,
    mut on_retry: RetryCallback<'_>,
) -> Result<CompletionResponse> {
    let mut attempt = 0;
    loop {
        let err = match backend.complete(client, base_url, request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if attempt >= config.max_retries || !is_retryable(&err, config) {
            return Err(err);
        }

        let delay = match &err {
            HarnessError::HttpError {
                retry_after: Some(ra),
                ..
            } if config.respect_retry_after => *ra,
            _ => config.delay_for_attempt(attempt),
        };
        attempt += 1;

        tracing::debug!(
            backend = backend.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying completion request"
        );
        if let Some(ref mut cb) = on_retry {
            cb(attempt, delay, &err.to_string());
        }

        tokio::time::sleep(delay).await;
    }
}
