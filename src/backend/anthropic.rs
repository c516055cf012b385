//! Backend for the Anthropic Messages API.
//!
//! Endpoint: `/v1/messages`. Human turns are sent as `user`, assistant turns
//! as `assistant`. A trailing assistant turn is a prefill: the model continues
//! it, and only the continuation comes back in the response.

use super::{Backend, CompletionRequest, CompletionResponse};
use crate::conversation::Role;
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Value sent in the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// Backend for Anthropic's Messages API.
///
/// # Example
///
/// ```
/// use llm_harness::backend::AnthropicBackend;
///
/// let backend = AnthropicBackend::new("sk-ant-...");
/// assert!(backend.has_api_key());
/// ```
#[derive(Clone)]
pub struct AnthropicBackend {
    api_key: String,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = match self.api_key.get(..6) {
            Some(head) if self.api_key.len() > 6 => format!("{}***", head),
            _ => "***".to_string(),
        };
        f.debug_struct("AnthropicBackend")
            .field("api_key", &masked)
            .finish()
    }
}

impl AnthropicBackend {
    /// Create a backend authenticating with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Build the `messages` array.
    ///
    /// The API rejects a final assistant message that ends in whitespace and
    /// any message without text, so a trailing prefill is right-trimmed and
    /// blank assistant turns are skipped.
    fn build_messages(request: &CompletionRequest) -> Vec<Value> {
        let last = request.turns.len().saturating_sub(1);
        request
            .turns
            .iter()
            .enumerate()
            .filter_map(|(i, turn)| {
                let (role, content) = match turn.role {
                    Role::Human => ("user", turn.text.as_str()),
                    Role::Assistant if i == last => ("assistant", turn.text.trim_end()),
                    Role::Assistant => ("assistant", turn.text.as_str()),
                };
                if turn.role == Role::Assistant && content.trim().is_empty() {
                    return None;
                }
                Some(json!({"role": role, "content": content}))
            })
            .collect()
    }

    /// Build the request body for `/v1/messages`.
    fn build_body(request: &CompletionRequest) -> Value {
        json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": Self::build_messages(request),
        })
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<Duration> {
        value.trim().parse::<u64>().ok().map(Duration::from_secs)
    }

    /// Concatenate the `text` content blocks of a response.
    fn extract_text(json_resp: &Value) -> String {
        json_resp
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["id", "model", "stop_reason", "usage"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        let body = Self::build_body(request);

        let resp = client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(HarnessError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }

        let json_resp: Value = resp.json().await?;

        Ok(CompletionResponse {
            text: Self::extract_text(&json_resp),
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
