//! Backoff strategy trait.

use std::fmt;
use std::time::Duration;

/// Trait for backoff strategies.
///
/// A strategy maps the index of a failed attempt (0-based) to the time to
/// wait before the next attempt. Implementations must be pure apart from
/// drawing jitter samples.
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    /// Get the wait after the given failed attempt.
    fn delay(&self, attempt: u32) -> Duration;
}

/// Strategy backed by a closure.
#[derive(Clone)]
pub struct FnBackoff<F> {
    f: F,
}

impl<F> FnBackoff<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    /// Wrap a closure as a backoff strategy.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnBackoff<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBackoff").finish_non_exhaustive()
    }
}

impl<F> BackoffStrategy for FnBackoff<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        (self.f)(attempt)
    }
}

/// Wrap a closure as a backoff strategy.
pub fn backoff_fn<F>(f: F) -> FnBackoff<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    FnBackoff::new(f)
}
