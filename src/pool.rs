//! A fixed-size pool of client handles bounding concurrent requests.
//!
//! [`ClientPool`] holds `size` interchangeable handles. A task borrows one
//! with [`acquire`](ClientPool::acquire), uses it, and gives it back by
//! dropping the returned [`PooledClient`] guard, so release happens on every
//! exit path including `?` and panics. At most `size` guards exist at once.
//!
//! Internally a [`Semaphore`] counts idle handles and guards a free list:
//! a permit is taken before a handle is popped, and a handle is pushed back
//! before its permit is returned. Hand-off order between waiters is not part
//! of the contract.
//!
//! # Example
//!
//! ```
//! use llm_harness::pool::ClientPool;
//!
//! # async fn demo() -> llm_harness::Result<()> {
//! let pool = ClientPool::from_handles(vec!["a", "b"]);
//! {
//!     let first = pool.acquire().await?;
//!     let _second = pool.acquire().await?;
//!     assert_eq!(pool.available(), 0);
//!     first.release();
//! }
//! assert_eq!(pool.available(), 2);
//! # Ok(())
//! # }
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::{
    cancel::Cancellation,
    client::{Client, ClientConfig},
    error::{HarnessError, Result},
};

struct Idle<C> {
    handles: Vec<C>,
    closed: bool,
}

struct PoolInner<C> {
    size: usize,
    semaphore: Semaphore,
    idle: Mutex<Idle<C>>,
    outstanding: AtomicUsize,
}

impl<C> PoolInner<C> {
    fn lock_idle(&self) -> MutexGuard<'_, Idle<C>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn put_back(&self, handle: C) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        let mut idle = self.lock_idle();
        if idle.closed {
            tracing::debug!("client released after pool close; dropping it");
            return;
        }
        idle.handles.push(handle);
        drop(idle);
        self.semaphore.add_permits(1);
        tracing::debug!(available = self.semaphore.available_permits(), "client released");
    }
}

/// A fixed-capacity pool of reusable client handles.
///
/// Cloning the pool is cheap and yields another reference to the same
/// handles. `C` defaults to [`Client`], but any `Send` handle type works.
pub struct ClientPool<C = Client> {
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for ClientPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ClientPool<Client> {
    /// Build `size` clients sharing `credential` and `config`.
    ///
    /// A `size` of zero is accepted and yields a pool whose acquires never
    /// complete; validate the size before calling if that matters.
    pub fn new(credential: &str, size: usize, config: ClientConfig) -> Result<Self> {
        let handles = (0..size)
            .map(|_| Client::new(credential, config.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_handles(handles))
    }
}

impl<C> ClientPool<C> {
    /// Wrap an existing set of handles. The pool's size is `handles.len()`.
    pub fn from_handles(handles: Vec<C>) -> Self {
        let size = handles.len();
        Self {
            inner: Arc::new(PoolInner {
                size,
                semaphore: Semaphore::new(size),
                idle: Mutex::new(Idle {
                    handles,
                    closed: false,
                }),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait until a handle is free and take it.
    ///
    /// Fails with [`HarnessError::PoolClosed`] if the pool is closed before
    /// or while waiting.
    pub async fn acquire(&self) -> Result<PooledClient<C>> {
        let permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .map_err(|_| HarnessError::PoolClosed)?;
        permit.forget();
        self.checkout()
    }

    /// Take a handle only if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<PooledClient<C>>> {
        match self.inner.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.checkout().map(Some)
            }
            Err(tokio::sync::TryAcquireError::NoPermits) => Ok(None),
            Err(tokio::sync::TryAcquireError::Closed) => Err(HarnessError::PoolClosed),
        }
    }

    /// Like [`acquire`](Self::acquire), but give up with
    /// [`HarnessError::Timeout`] after `limit`.
    pub async fn acquire_timeout(&self, limit: Duration) -> Result<PooledClient<C>> {
        match tokio::time::timeout(limit, self.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::Timeout(limit)),
        }
    }

    /// Like [`acquire`](Self::acquire), but give up with
    /// [`HarnessError::Cancelled`] once `cancel` fires.
    pub async fn acquire_cancellable(&self, cancel: &Cancellation) -> Result<PooledClient<C>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HarnessError::Cancelled),
            result = self.acquire() => result,
        }
    }

    /// Close the pool.
    ///
    /// Waiting and future acquirers fail with [`HarnessError::PoolClosed`].
    /// Idle handles are dropped now; handles still checked out are dropped
    /// when their guards are released.
    pub fn close(&self) {
        let mut idle = self.inner.lock_idle();
        idle.closed = true;
        idle.handles.clear();
        drop(idle);
        self.inner.semaphore.close();
        tracing::debug!(
            outstanding = self.outstanding(),
            "client pool closed"
        );
    }

    /// Number of handles the pool was created with.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Handles that could be acquired right now.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Handles currently checked out.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    /// Pop a handle after a permit has been consumed.
    fn checkout(&self) -> Result<PooledClient<C>> {
        let handle = self.inner.lock_idle().handles.pop();
        match handle {
            Some(handle) => {
                self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(available = self.available(), "client acquired");
                Ok(PooledClient {
                    handle: Some(handle),
                    pool: Arc::clone(&self.inner),
                })
            }
            // Only reachable when close() raced the permit hand-off.
            None => Err(HarnessError::PoolClosed),
        }
    }
}

impl<C> std::fmt::Debug for ClientPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("size", &self.size())
            .field("available", &self.available())
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A handle checked out of a [`ClientPool`].
///
/// Dereferences to the handle. Dropping the guard returns the handle to the
/// pool; [`release`](Self::release) does the same explicitly. The guard owns
/// a reference to the pool, so it can move into spawned tasks.
pub struct PooledClient<C = Client> {
    handle: Option<C>,
    pool: Arc<PoolInner<C>>,
}

impl<C> PooledClient<C> {
    /// Return the handle to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<C> Deref for PooledClient<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.handle
            .as_ref()
            .expect("pooled handle is present until the guard is dropped")
    }
}

impl<C> DerefMut for PooledClient<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.handle
            .as_mut()
            .expect("pooled handle is present until the guard is dropped")
    }
}

impl<C> Drop for PooledClient<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.put_back(handle);
        }
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for PooledClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledClient").field(&self.handle).finish()
    }
}
