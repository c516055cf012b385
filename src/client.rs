//! The client handle: one session able to issue completion requests.
//!
//! A [`Client`] bundles an HTTP client, a [`Backend`], and a
//! [`ClientConfig`]. It is cheap to clone and is the resource that
//! [`ClientPool`](crate::pool::ClientPool) circulates between tasks.

use crate::{
    backend::{self, AnthropicBackend, Backend, BackoffConfig, CompletionRequest, CompletionResponse},
    cancel::Cancellation,
    conversation::{Conversation, Turn},
    error::{HarnessError, Result},
    events::{emit, Event, EventHandler},
};
use std::sync::Arc;
use std::time::Duration;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Configuration for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Model identifier sent with every request.
    pub model: String,

    /// Maximum tokens to generate for [`Client::prompt`].
    pub max_tokens: u32,

    /// Temperature for [`Client::prompt`] (0.0 = deterministic).
    pub temperature: f64,

    /// Per-request deadline. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,

    /// Provider base URL.
    pub base_url: String,

    /// Transport retry policy. Default: [`BackoffConfig::none()`].
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1000,
            temperature: 0.0,
            request_timeout: Some(Duration::from_secs(60)),
            base_url: backend::anthropic::DEFAULT_BASE_URL.to_string(),
            backoff: BackoffConfig::none(),
        }
    }
}

impl ClientConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// A reusable handle for issuing completion requests.
///
/// # Example
///
/// ```
/// use llm_harness::backend::MockBackend;
/// use llm_harness::client::{Client, ClientConfig};
/// use std::sync::Arc;
///
/// # async fn demo() -> llm_harness::Result<()> {
/// let client = Client::with_backend(Arc::new(MockBackend::fixed("Sacramento")), ClientConfig::default())?;
/// let answer = client.prompt("What is the state capital of California?").await?;
/// assert_eq!(answer, "Sacramento");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    backend: Arc<dyn Backend>,
    config: ClientConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Client {
    /// Create an Anthropic-backed client authenticating with `credential`.
    pub fn new(credential: impl Into<String>, config: ClientConfig) -> Result<Self> {
        Self::with_backend(Arc::new(AnthropicBackend::new(credential)), config)
    }

    /// Create a client over an arbitrary backend.
    pub fn with_backend(backend: Arc<dyn Backend>, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            backend,
            config,
            event_handler: None,
        })
    }

    /// Attach an event handler for transport retry events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Request a completion of `conversation`.
    ///
    /// A trailing assistant turn is continued, and only the continuation is
    /// returned. Fails with [`HarnessError::Timeout`] if the configured
    /// request deadline passes and with [`HarnessError::Cancelled`] if
    /// `cancel` fires first.
    pub async fn complete(
        &self,
        conversation: &Conversation,
        max_tokens: u32,
        temperature: f64,
        cancel: Option<&Cancellation>,
    ) -> Result<CompletionResponse> {
        if let Some(c) = cancel {
            c.check()?;
        }

        let request = CompletionRequest {
            model: self.config.model.clone(),
            turns: conversation.turns().to_vec(),
            max_tokens,
            temperature,
        };

        tracing::debug!(
            backend = self.backend.name(),
            model = %request.model,
            turns = request.turns.len(),
            max_tokens,
            "sending completion request"
        );

        let event_handler = self.event_handler.clone();
        let backend_name = self.backend.name();
        let mut on_retry = |attempt: u32, delay: Duration, reason: &str| {
            emit(
                &event_handler,
                Event::TransportRetry {
                    backend: backend_name,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        };

        let call = backend::with_backoff(
            &self.backend,
            &self.http,
            &self.config.base_url,
            &request,
            &self.config.backoff,
            Some(&mut on_retry),
        );

        let timeout = self.config.request_timeout;
        let bounded = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(HarnessError::Timeout(limit)),
                },
                None => call.await,
            }
        };

        match cancel {
            Some(c) => {
                tokio::select! {
                    biased;
                    _ = c.cancelled() => Err(HarnessError::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }

    /// Send a single human turn using the configured token budget and
    /// temperature, returning the generated text.
    pub async fn prompt(&self, text: impl Into<String>) -> Result<String> {
        let conversation = Conversation::new().with(Turn::human(text));
        let response = self
            .complete(
                &conversation,
                self.config.max_tokens,
                self.config.temperature,
                None,
            )
            .await?;
        Ok(response.text)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}
