//! Event hooks for retry and transport diagnostics.
//!
//! Provides an optional, non-intrusive way to observe what the retry parser
//! and clients are doing. Intermediate decode failures are never returned as
//! errors; an [`EventHandler`] is how a caller sees them besides the log.

use std::sync::Arc;

/// Events emitted by [`RetryParser`](crate::retry::RetryParser) and
/// [`Client`](crate::client::Client).
#[derive(Debug, Clone)]
pub enum Event {
    /// Decoding the latest assistant turn failed.
    DecodeFailed {
        /// The decode attempt that failed (1-indexed).
        attempt: u32,
        /// The decode error message.
        error: String,
        /// Retries still available after this failure.
        retries_left: u32,
    },
    /// A corrective request is about to be sent.
    RetryStart {
        /// The retry number (1-indexed).
        attempt: u32,
        /// The decode error that triggered it.
        reason: String,
    },
    /// A decode session that needed at least one retry has finished.
    RetryEnd {
        /// Number of corrective requests made.
        attempts: u32,
        /// Whether a value was decoded.
        success: bool,
    },
    /// A transport-level retry due to an HTTP or connection error.
    TransportRetry {
        /// Backend name.
        backend: &'static str,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Reason for the retry (error description).
        reason: String,
    },
}

/// Handler for lifecycle events.
///
/// # Example
///
/// ```
/// use llm_harness::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         if let Event::DecodeFailed { attempt, error, .. } = event {
///             eprintln!("attempt {} failed: {}", attempt, error);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
