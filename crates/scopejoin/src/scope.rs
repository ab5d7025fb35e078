//! Cancellable scopes
//!
//! [`Scope`] is the capability every node is built on: a done signal, the
//! error and cause recorded once done, and local keyed values.
//! [`CancelScope`] is the concrete, cloneable implementation used for leaf
//! nodes and as the internal root of every join and merge.

use crate::error::{Cause, ScopeError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Value stored under a scope key
pub type Value = serde_json::Value;

/// A cancellable unit with a done signal, a post-done error and keyed values
#[async_trait]
pub trait Scope: Send + Sync + fmt::Debug {
    /// Resolve once the scope is done
    async fn done(&self);

    /// Non-blocking readiness check
    fn is_done(&self) -> bool;

    /// Why the scope is done; `None` while it is still live
    fn err(&self) -> Option<ScopeError>;

    /// Recorded cause; `None` while live or after a clean cancel
    fn cause(&self) -> Option<Cause>;

    /// Value set on this scope under `key`
    fn value(&self, key: &str) -> Option<Value>;
}

#[async_trait]
impl<S: Scope + ?Sized> Scope for Arc<S> {
    async fn done(&self) {
        (**self).done().await;
    }

    fn is_done(&self) -> bool {
        (**self).is_done()
    }

    fn err(&self) -> Option<ScopeError> {
        (**self).err()
    }

    fn cause(&self) -> Option<Cause> {
        (**self).cause()
    }

    fn value(&self, key: &str) -> Option<Value> {
        (**self).value(key)
    }
}

/// Completion record, written once
#[derive(Debug, Clone)]
struct Completion {
    err: ScopeError,
    cause: Option<Cause>,
}

#[derive(Debug)]
struct ScopeState {
    values: HashMap<String, Value>,
    deadline: Option<Instant>,
    completion: Mutex<Option<Completion>>,
    done_tx: watch::Sender<bool>,
}

/// Cancellable scope handle
///
/// Clones share state. Completion is first-caller-wins: the first of
/// [`cancel`](Self::cancel), [`cancel_with_cause`](Self::cancel_with_cause)
/// or an elapsed deadline records the error and cause, and every later
/// attempt is a no-op returning `false`.
#[derive(Debug, Clone)]
pub struct CancelScope {
    state: Arc<ScopeState>,
}

impl CancelScope {
    /// Create a live scope with no values and no deadline
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        ScopeBuilder::new().build()
    }

    /// Start building a scope with values or a deadline
    #[inline]
    #[must_use]
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::new()
    }

    /// Cancel without a cause
    ///
    /// Returns `true` if this call completed the scope.
    #[allow(clippy::must_use_candidate)]
    pub fn cancel(&self) -> bool {
        self.complete(ScopeError::Cancelled, None)
    }

    /// Cancel and record `cause`
    ///
    /// Returns `true` if this call completed the scope; a scope that is
    /// already done keeps its original cause.
    #[allow(clippy::must_use_candidate)]
    pub fn cancel_with_cause(&self, cause: Cause) -> bool {
        self.complete(ScopeError::Cancelled, Some(cause))
    }

    /// Deadline after which the scope reports `DeadlineExceeded`
    ///
    /// Measured on tokio's clock, so paused or advanced test time applies
    /// to both `done()` and the status accessors.
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    /// Check whether two handles share the same scope
    #[inline]
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.state, &b.state)
    }

    fn complete(&self, err: ScopeError, cause: Option<Cause>) -> bool {
        {
            let mut completion = self.state.completion.lock();
            if completion.is_some() {
                return false;
            }
            *completion = Some(Completion { err, cause });
        }
        // Flip the signal only after the record is visible
        self.state.done_tx.send_replace(true);
        true
    }

    fn expire_if_due(&self) {
        if let Some(deadline) = self.state.deadline {
            if Instant::now() >= deadline {
                self.complete(ScopeError::DeadlineExceeded, None);
            }
        }
    }

    fn completion(&self) -> Option<Completion> {
        self.expire_if_due();
        self.state.completion.lock().clone()
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scope for CancelScope {
    async fn done(&self) {
        let mut rx = self.state.done_tx.subscribe();
        match self.state.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = signalled(&mut rx) => {}
                    () = tokio::time::sleep_until(deadline) => {
                        self.complete(ScopeError::DeadlineExceeded, None);
                    }
                }
            }
            None => signalled(&mut rx).await,
        }
    }

    fn is_done(&self) -> bool {
        self.completion().is_some()
    }

    fn err(&self) -> Option<ScopeError> {
        self.completion().map(|c| c.err)
    }

    fn cause(&self) -> Option<Cause> {
        self.completion().and_then(|c| c.cause)
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.state.values.get(key).cloned()
    }
}

/// Wait for the done flag
///
/// The sender lives in the scope's own state, so `wait_for` can only
/// return once the flag is set.
async fn signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|done| *done).await;
}

/// Builder for [`CancelScope`]
#[derive(Debug, Default, Clone)]
pub struct ScopeBuilder {
    values: HashMap<String, Value>,
    deadline: Option<Instant>,
}

impl ScopeBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value; a later call with the same key replaces it
    #[inline]
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Expire at `deadline`
    ///
    /// An earlier deadline already set is kept.
    #[inline]
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Expire `timeout` from now
    #[inline]
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Build the scope
    #[must_use]
    pub fn build(self) -> CancelScope {
        let (done_tx, _) = watch::channel(false);
        CancelScope {
            state: Arc::new(ScopeState {
                values: self.values,
                deadline: self.deadline,
                completion: Mutex::new(None),
                done_tx,
            }),
        }
    }
}
