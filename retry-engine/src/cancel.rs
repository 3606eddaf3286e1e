//! Cancellation signals observed by the retry engine.
//!
//! The engine checks a signal synchronously before each call when no
//! backoff is configured, and races it against the backoff timer otherwise.
//! A call already in progress is never interrupted.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Terminal reason carried by a fired cancellation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    /// The signal was cancelled explicitly.
    #[error("operation canceled")]
    Canceled,
    /// The signal's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A cooperative cancellation signal.
#[async_trait]
pub trait Cancellation: Send + Sync {
    /// Return the terminal reason if the signal has already fired.
    fn reason(&self) -> Option<Cancelled>;

    /// Wait until the signal fires.
    async fn cancelled(&self) -> Cancelled;

    /// Check if the signal has already fired.
    fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }
}

#[async_trait]
impl Cancellation for CancellationToken {
    fn reason(&self) -> Option<Cancelled> {
        self.is_cancelled().then_some(Cancelled::Canceled)
    }

    async fn cancelled(&self) -> Cancelled {
        CancellationToken::cancelled(self).await;
        Cancelled::Canceled
    }
}

/// Signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl Cancellation for NeverCancel {
    fn reason(&self) -> Option<Cancelled> {
        None
    }

    async fn cancelled(&self) -> Cancelled {
        std::future::pending().await
    }
}

/// A cancellation token with an optional deadline.
///
/// Explicit cancellation takes priority over an expired deadline when both
/// have happened.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// Create a scope with a fresh token and no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope around an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Cancel the scope.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Get the underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Get the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[async_trait]
impl Cancellation for CancelScope {
    fn reason(&self) -> Option<Cancelled> {
        if self.token.is_cancelled() {
            return Some(Cancelled::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    async fn cancelled(&self) -> Cancelled {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Cancelled::Canceled,
                _ = sleep_until(deadline) => Cancelled::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Cancelled::Canceled
            }
        }
    }
}

#[async_trait]
impl<C: Cancellation + ?Sized> Cancellation for &C {
    fn reason(&self) -> Option<Cancelled> {
        (**self).reason()
    }

    async fn cancelled(&self) -> Cancelled {
        (**self).cancelled().await
    }
}

#[async_trait]
impl<C: Cancellation + ?Sized> Cancellation for Arc<C> {
    fn reason(&self) -> Option<Cancelled> {
        (**self).reason()
    }

    async fn cancelled(&self) -> Cancelled {
        (**self).cancelled().await
    }
}
