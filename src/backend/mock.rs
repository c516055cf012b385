//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] returns pre-configured responses in order, counts calls,
//! and keeps a copy of every request it saw, so retry behaviour can be
//! asserted deterministically.
//!
//! # Example
//!
//! ```
//! use llm_harness::backend::MockBackend;
//!
//! let mock = MockBackend::new(vec!["<a>1</a>".to_string()]);
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, CompletionRequest, CompletionResponse};
use crate::error::{HarnessError, Result};

/// A test backend that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<String>,
    index: AtomicUsize,
    calls: AtomicUsize,
    fail_first: usize,
    fail_status: u16,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned responses.
    ///
    /// An empty list behaves like a single empty response.
    pub fn new(responses: Vec<String>) -> Self {
        let responses = if responses.is_empty() {
            vec![String::new()]
        } else {
            responses
        };
        Self {
            responses,
            index: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            fail_first: 0,
            fail_status: 500,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Fail the first `n` calls with an HTTP error of the given status.
    ///
    /// Failed calls still count towards [`calls`](Self::calls) but do not
    /// consume a canned response.
    pub fn fail_first(mut self, n: usize, status: u16) -> Self {
        self.fail_first = n;
        self.fail_status = status;
        self
    }

    /// Fail every call with an HTTP error of the given status.
    pub fn always_failing(status: u16) -> Self {
        Self::new(Vec::new()).fail_first(usize::MAX, status)
    }

    /// Number of `complete` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn next_response(&self) -> String {
        let idx = self.index.fetch_add(1, Ordering::SeqCst) % self.responses.len();
        self.responses[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        if call < self.fail_first {
            return Err(HarnessError::HttpError {
                status: self.fail_status,
                body: "mock failure".into(),
                retry_after: None,
            });
        }

        Ok(CompletionResponse {
            text: self.next_response(),
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
