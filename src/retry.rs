//! Retry-on-parse-failure decoding of model output.
//!
//! [`RetryParser`] takes a conversation whose last turn is the model's
//! answer and decodes it into `T`. When decoding fails it asks the model to
//! fix its answer: it appends a corrective human turn quoting the decode
//! error, then an assistant turn pre-seeded with the expected prefix, and
//! requests a continuation of that prefix. The continuation is appended to
//! the seeded turn and decoding is tried again, up to
//! [`RetryConfig::max_retries`] times.
//!
//! Only decode failures are retried. Errors from the completion service
//! (transport, HTTP status, timeout, cancellation) propagate unchanged on
//! the first occurrence.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::{
    cancel::Cancellation,
    client::Client,
    conversation::{Conversation, Turn},
    decode::Decode,
    error::{HarnessError, Result},
    events::{emit, Event, EventHandler},
};

/// Temperature used for every corrective request.
const RETRY_TEMPERATURE: f64 = 0.0;

/// Configuration for a [`RetryParser`].
///
/// # Example
///
/// ```
/// use llm_harness::retry::RetryConfig;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_retries, 2);
/// assert_eq!(config.max_tokens, 5000);
///
/// let config = RetryConfig::new(4).with_max_tokens(2000);
/// assert_eq!(config.max_retries, 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Corrective requests allowed after the first failed decode.
    /// Decoding is attempted at most `max_retries + 1` times.
    pub max_retries: u32,

    /// Token budget for each corrective request.
    pub max_tokens: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_tokens: 5000,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A decoded value plus how many decode attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    /// Decode attempts made, the successful one included (1 = no retries).
    pub attempts: u32,
}

impl<T> Parsed<T> {
    /// Corrective requests that were needed.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Build the human turn that asks the model to repair its previous answer.
///
/// The decode error is embedded verbatim.
pub fn corrective_prompt(message: &str) -> String {
    format!(
        "It looks like your response was not in the correct format. \
         I got the following <error> trying to parse your response:\n\n\
         <error>\n{}\n</error>\n\n\
         Can you fix the issue with your previous response?",
        message
    )
}

/// Decodes model output into `T`, re-prompting the model on failure.
///
/// The parser holds only configuration, so one instance can serve any
/// number of sequential or concurrent sessions; the retry budget is counted
/// per call.
///
/// # Example
///
/// ```
/// use llm_harness::backend::MockBackend;
/// use llm_harness::client::{Client, ClientConfig};
/// use llm_harness::conversation::{Conversation, Turn};
/// use llm_harness::retry::{RetryConfig, RetryParser};
/// use std::sync::Arc;
///
/// # async fn demo() -> llm_harness::Result<()> {
/// let mock = Arc::new(MockBackend::fixed("Sacramento"));
/// let client = Client::with_backend(mock, ClientConfig::default())?;
/// let mut convo = Conversation::new()
///     .with(Turn::human("Name the capital of California."))
///     .with(Turn::assistant(""));
///
/// let parser = RetryParser::<String>::new(RetryConfig::default());
/// let answer = parser.parse(&client, &mut convo, "").await?;
/// assert_eq!(answer, "Sacramento");
/// assert_eq!(convo.len(), 4);
/// # Ok(())
/// # }
/// ```
pub struct RetryParser<T> {
    config: RetryConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
    _target: PhantomData<fn() -> T>,
}

impl<T> Clone for RetryParser<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            event_handler: self.event_handler.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for RetryParser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryParser")
            .field("target", &std::any::type_name::<T>())
            .field("config", &self.config)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

impl<T: Decode> Default for RetryParser<T> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<T: Decode> RetryParser<T> {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            event_handler: None,
            _target: PhantomData,
        }
    }

    /// Attach an event handler for decode and retry events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decode the last turn of `conversation`, re-prompting on failure.
    ///
    /// `conversation` needs at least two turns and is extended in place with
    /// every corrective pair, so afterwards it holds the full exchange.
    /// `prefix` seeds each new assistant turn; it is usually the opening
    /// of the expected document, such as `<shopping-list>`.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidInput`] if the conversation is too short.
    ///   No request is made.
    /// - [`HarnessError::ParseExhausted`] once every attempt has failed to
    ///   decode, carrying the last decode error.
    /// - Any error from [`Client::complete`], unchanged.
    pub async fn parse(
        &self,
        client: &Client,
        conversation: &mut Conversation,
        prefix: &str,
    ) -> Result<T> {
        self.run(client, conversation, prefix, None)
            .await
            .map(Parsed::into_value)
    }

    /// Like [`parse`](Self::parse), but abandons the session with
    /// [`HarnessError::Cancelled`] once `cancel` fires.
    pub async fn parse_with_cancel(
        &self,
        client: &Client,
        conversation: &mut Conversation,
        prefix: &str,
        cancel: &Cancellation,
    ) -> Result<T> {
        self.run(client, conversation, prefix, Some(cancel))
            .await
            .map(Parsed::into_value)
    }

    /// Like [`parse`](Self::parse), also reporting how many attempts it took.
    pub async fn parse_detailed(
        &self,
        client: &Client,
        conversation: &mut Conversation,
        prefix: &str,
    ) -> Result<Parsed<T>> {
        self.run(client, conversation, prefix, None).await
    }

    async fn run(
        &self,
        client: &Client,
        conversation: &mut Conversation,
        prefix: &str,
        cancel: Option<&Cancellation>,
    ) -> Result<Parsed<T>> {
        if conversation.len() < 2 {
            return Err(HarnessError::InvalidInput(format!(
                "conversation must contain at least 2 turns, got {}",
                conversation.len()
            )));
        }

        let mut retries_left = self.config.max_retries;
        let mut attempt: u32 = 0;
        let mut requests: u32 = 0;

        loop {
            attempt += 1;
            let text = conversation.last().map(|t| t.text.as_str()).unwrap_or_default();

            let message = match T::decode(text) {
                Ok(value) => {
                    if requests > 0 {
                        tracing::info!(attempt, "response decoded after retry");
                        self.finish(requests, true);
                    }
                    return Ok(Parsed { value, attempts: attempt });
                }
                Err(e) => e.to_string(),
            };

            tracing::warn!(attempt, retries_left, error = %message, "failed to decode response");
            emit(
                &self.event_handler,
                Event::DecodeFailed {
                    attempt,
                    error: message.clone(),
                    retries_left,
                },
            );

            if retries_left == 0 {
                if requests > 0 {
                    self.finish(requests, false);
                }
                return Err(HarnessError::ParseExhausted {
                    attempts: attempt,
                    message,
                });
            }
            retries_left -= 1;

            conversation.push(Turn::human(corrective_prompt(&message)));
            conversation.push(Turn::assistant(prefix));
            emit(
                &self.event_handler,
                Event::RetryStart {
                    attempt,
                    reason: message,
                },
            );

            requests += 1;
            let response = match client
                .complete(conversation, self.config.max_tokens, RETRY_TEMPERATURE, cancel)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "corrective request failed");
                    self.finish(requests, false);
                    return Err(e);
                }
            };
            conversation.extend_last(&response.text);
        }
    }

    fn finish(&self, requests: u32, success: bool) {
        emit(
            &self.event_handler,
            Event::RetryEnd {
                attempts: requests,
                success,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, CompletionRequest, CompletionResponse, MockBackend};
    use crate::client::ClientConfig;
    use crate::conversation::Role;
    use crate::pool::ClientPool;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use crate::decode::{xml, DecodeError};
    use crate::events::FnEventHandler;
    use serde::Deserialize;
    use std::sync::Mutex;

    const PREFIX: &str = "<shopping-list>";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
        quantity: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct ShoppingList {
        #[serde(rename = "item", default)]
        items: Vec<Item>,
    }

    impl Decode for ShoppingList {
        fn decode(text: &str) -> std::result::Result<Self, DecodeError> {
            xml::from_markup_rooted(text, "shopping-list")
        }
    }

    const VALID: &str = "<shopping-list>
  <item><name>mayonnaise</name><quantity>3 tablespoons</quantity></item>
  <item><name>black pepper</name><quantity>to taste</quantity></item>
</shopping-list>";

    // Unclosed <name> tag.
    const MALFORMED: &str = "<shopping-list>
  <item><name>mayonnaise</name><quantity>3 tablespoons</quantity></item>
  <item><name>black pepper</name\n<quantity>to taste</quantity></item>
</shopping-list>";

    const GOOD_CONTINUATION: &str = "
  <item><name>salt</name><quantity>1 pinch</quantity></item>
</shopping-list>";

    const BAD_CONTINUATION: &str = "
  <item><name>salt</name><quantity>1 pinch</quantity></items>
</shopping-list>";

    fn client(mock: &Arc<MockBackend>) -> Client {
        Client::with_backend(mock.clone(), ClientConfig::default()).unwrap()
    }

    fn conversation(answer: &str) -> Conversation {
        Conversation::new()
            .with(Turn::human("List the ingredients as <shopping-list> markup."))
            .with(Turn::assistant(answer))
    }

    fn recorder() -> (Arc<Mutex<Vec<Event>>>, Arc<dyn EventHandler>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |e: Event| {
            sink.lock().unwrap().push(e);
        }));
        (events, handler)
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_tokens, 5000);
        assert_eq!(RetryConfig::new(0).max_tokens, 5000);
        assert_eq!(RetryConfig::default().with_max_retries(7).max_retries, 7);
    }

    #[test]
    fn test_corrective_prompt_embeds_error_verbatim() {
        let text = corrective_prompt("expected `</item>`, found `</items>`");
        assert!(text.starts_with("It looks like your response was not in the correct format."));
        assert!(text.contains("<error>\nexpected `</item>`, found `</items>`\n</error>"));
        assert!(text.ends_with("Can you fix the issue with your previous response?"));
    }

    #[tokio::test]
    async fn test_valid_first_answer_makes_no_request() {
        let mock = Arc::new(MockBackend::fixed(GOOD_CONTINUATION));
        let mut convo = conversation(VALID);
        let parser = RetryParser::<ShoppingList>::default();

        let parsed = parser
            .parse_detailed(&client(&mock), &mut convo, PREFIX)
            .await
            .unwrap();

        assert_eq!(parsed.attempts, 1);
        assert_eq!(parsed.retries(), 0);
        assert_eq!(parsed.value.items.len(), 2);
        assert_eq!(parsed.value.items[1].quantity, "to taste");
        assert_eq!(mock.calls(), 0);
        assert_eq!(convo.len(), 2);
    }

    #[tokio::test]
    async fn test_too_short_conversation_is_invalid_input() {
        let mock = Arc::new(MockBackend::fixed(GOOD_CONTINUATION));
        let mut convo = Conversation::new().with(Turn::human("hello"));
        let parser = RetryParser::<ShoppingList>::default();

        let err = parser.parse(&client(&mock), &mut convo, PREFIX).await.unwrap_err();

        assert!(matches!(err, HarnessError::InvalidInput(_)));
        assert_eq!(mock.calls(), 0);
        assert_eq!(convo.len(), 1);
    }

    #[tokio::test]
    async fn test_recovers_on_last_allowed_attempt() {
        let mock = Arc::new(MockBackend::new(vec![
            BAD_CONTINUATION.to_string(),
            GOOD_CONTINUATION.to_string(),
        ]));
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(2));

        let parsed = parser
            .parse_detailed(&client(&mock), &mut convo, PREFIX)
            .await
            .unwrap();

        assert_eq!(mock.calls(), 2);
        assert_eq!(parsed.attempts, 3);
        assert_eq!(convo.len(), 2 + 2 * 2);
        assert_eq!(
            parsed.value.items,
            vec![Item {
                name: "salt".into(),
                quantity: "1 pinch".into()
            }]
        );

        let turns = convo.turns();
        assert_eq!(turns[2].role, Role::Human);
        assert_eq!(turns[4].role, Role::Human);
        assert_eq!(turns[3].text, format!("{}{}", PREFIX, BAD_CONTINUATION));
        assert_eq!(turns[5].text, format!("{}{}", PREFIX, GOOD_CONTINUATION));
    }

    #[tokio::test]
    async fn test_corrective_turn_quotes_decode_error() {
        let mock = Arc::new(MockBackend::fixed(GOOD_CONTINUATION));
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::default();
        let expected = ShoppingList::decode(MALFORMED).unwrap_err().to_string();

        parser.parse(&client(&mock), &mut convo, PREFIX).await.unwrap();

        assert_eq!(convo.turns()[2], Turn::human(corrective_prompt(&expected)));
        assert_eq!(convo.turns()[3], Turn::assistant(format!("{}{}", PREFIX, GOOD_CONTINUATION)));
    }

    #[tokio::test]
    async fn test_retry_requests_use_budget_and_zero_temperature() {
        let mock = Arc::new(MockBackend::new(vec![
            BAD_CONTINUATION.to_string(),
            GOOD_CONTINUATION.to_string(),
        ]));
        let client = Client::with_backend(
            mock.clone(),
            ClientConfig::default().with_temperature(0.9).with_max_tokens(10),
        )
        .unwrap();
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(2).with_max_tokens(1234));

        parser.parse(&client, &mut convo, PREFIX).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        for (i, req) in requests.iter().enumerate() {
            assert_eq!(req.max_tokens, 1234);
            assert_eq!(req.temperature, 0.0);
            assert_eq!(req.turns.len(), 4 + 2 * i);
            assert_eq!(req.turns.last(), Some(&Turn::assistant(PREFIX)));
        }
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_retries_requests() {
        let mock = Arc::new(MockBackend::fixed(BAD_CONTINUATION));
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(2));

        let err = parser.parse(&client(&mock), &mut convo, PREFIX).await.unwrap_err();

        assert_eq!(mock.calls(), 2);
        assert_eq!(convo.len(), 6);
        assert!(!err.is_service_error());
        match err {
            HarnessError::ParseExhausted { attempts, message } => {
                assert_eq!(attempts, 3);
                let last = ShoppingList::decode(&convo.turns()[5].text).unwrap_err();
                assert_eq!(message, last.to_string());
            }
            other => panic!("expected ParseExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_fails_without_request() {
        let mock = Arc::new(MockBackend::fixed(GOOD_CONTINUATION));
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(0));

        let err = parser.parse(&client(&mock), &mut convo, PREFIX).await.unwrap_err();

        assert!(matches!(err, HarnessError::ParseExhausted { attempts: 1, .. }));
        assert_eq!(mock.calls(), 0);
        assert_eq!(convo.len(), 2);
    }

    #[tokio::test]
    async fn test_service_error_is_not_retried() {
        let mock = Arc::new(MockBackend::always_failing(500));
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(2));

        let err = parser.parse(&client(&mock), &mut convo, PREFIX).await.unwrap_err();

        assert!(matches!(err, HarnessError::HttpError { status: 500, .. }));
        assert!(err.is_service_error());
        assert_eq!(mock.calls(), 1);
        assert_eq!(convo.len(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_session_stops_before_request() {
        let mock = Arc::new(MockBackend::fixed(GOOD_CONTINUATION));
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::default();
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = parser
            .parse_with_cancel(&client(&mock), &mut convo, PREFIX, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Cancelled));
        assert_eq!(mock.calls(), 0);
    }

    /// Signals when a request arrives, then never answers it.
    struct Stalled {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl Backend for Stalled {
        async fn complete(
            &self,
            _client: &reqwest::Client,
            _base_url: &str,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse> {
            self.started.notify_one();
            futures::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_request_releases_pooled_client() {
        let started = Arc::new(Notify::new());
        let stalled = Client::with_backend(
            Arc::new(Stalled {
                started: started.clone(),
            }),
            ClientConfig::default().with_request_timeout(None),
        )
        .unwrap();
        let pool = ClientPool::from_handles(vec![stalled]);
        let parser = RetryParser::<ShoppingList>::default();
        let mut convo = conversation(MALFORMED);

        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            started.notified().await;
            trigger.cancel();
        });

        let result = {
            let client = pool.acquire().await.unwrap();
            assert_eq!(pool.outstanding(), 1);
            parser
                .parse_with_cancel(&client, &mut convo, PREFIX, &cancel)
                .await
        };

        assert!(matches!(result, Err(HarnessError::Cancelled)));
        assert_eq!(convo.len(), 4);
        assert_eq!(convo.last(), Some(&Turn::assistant(PREFIX)));
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_parser_is_reusable_across_sessions() {
        let mock = Arc::new(MockBackend::fixed(BAD_CONTINUATION));
        let client = client(&mock);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(1));

        for _ in 0..2 {
            let mut convo = conversation(MALFORMED);
            let err = parser.parse(&client, &mut convo, PREFIX).await.unwrap_err();
            assert!(matches!(err, HarnessError::ParseExhausted { attempts: 2, .. }));
        }
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_events_trace_the_session() {
        let mock = Arc::new(MockBackend::new(vec![
            BAD_CONTINUATION.to_string(),
            GOOD_CONTINUATION.to_string(),
        ]));
        let (events, handler) = recorder();
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::default().with_event_handler(handler);

        parser.parse(&client(&mock), &mut convo, PREFIX).await.unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(
            events.as_slice(),
            [
                Event::DecodeFailed { attempt: 1, retries_left: 2, .. },
                Event::RetryStart { attempt: 1, .. },
                Event::DecodeFailed { attempt: 2, retries_left: 1, .. },
                Event::RetryStart { attempt: 2, .. },
                Event::RetryEnd { attempts: 2, success: true },
            ]
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_event_counts_requests() {
        let mock = Arc::new(MockBackend::fixed(BAD_CONTINUATION));
        let (events, handler) = recorder();
        let mut convo = conversation(MALFORMED);
        let parser = RetryParser::<ShoppingList>::new(RetryConfig::new(2)).with_event_handler(handler);

        let _ = parser.parse(&client(&mock), &mut convo, PREFIX).await;

        let events = events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(Event::RetryEnd { attempts: 2, success: false })
        ));
    }
}
