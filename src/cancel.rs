//! Cooperative cancellation shared between a caller and in-flight work.
//!
//! [`Cancellation`] is a cheap-to-clone handle over an atomic flag plus a
//! [`Notify`]. Code that only needs to check before starting a step calls
//! [`is_cancelled`](Cancellation::is_cancelled); code that must abandon an
//! in-flight request races it against [`cancelled`](Cancellation::cancelled).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Notify;

use crate::error::{HarnessError, Result};

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// A cancellation signal.
///
/// # Example
///
/// ```
/// use llm_harness::cancel::Cancellation;
///
/// let cancel = Cancellation::new();
/// let handle = cancel.clone();
/// assert!(!cancel.is_cancelled());
/// handle.cancel();
/// assert!(cancel.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: Arc<Inner>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Return [`HarnessError::Cancelled`] if the signal has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(HarnessError::Cancelled);
        }
        Ok(())
    }

    /// Resolves once the signal fires (immediately if it already has).
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent `cancel` is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_check_reports_cancelled() {
        let cancel = Cancellation::new();
        assert!(cancel.check().is_ok());
        cancel.cancel();
        assert!(matches!(cancel.check(), Err(HarnessError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_fired() {
        let cancel = Cancellation::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .expect("should resolve at once");
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let cancel = Cancellation::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_pending_until_cancel() {
        let cancel = Cancellation::new();
        let mut fut = tokio_test::task::spawn(cancel.cancelled());
        tokio_test::assert_pending!(fut.poll());
        cancel.cancel();
        assert!(fut.is_woken());
        tokio_test::assert_ready!(fut.poll());
    }
}
