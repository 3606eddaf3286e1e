//! Backoff strategies.

use crate::jitter::{self, JitterSource, SharedRandom};
use crate::strategy::BackoffStrategy;
use std::sync::Arc;
use std::time::Duration;

/// Constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear {
    /// Delay after every failed attempt.
    pub delay: Duration,
}

impl Linear {
    /// Create a linear backoff.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for Linear {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Delay doubling after every failed attempt.
///
/// The delay after attempt `i` is `base * 2^i`, so a base of 100ms yields
/// 100ms, 200ms, 400ms, 800ms, 1600ms. Values that do not fit saturate at
/// [`Duration::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exponential {
    /// Delay after the first failed attempt.
    pub base: Duration,
}

impl Exponential {
    /// Create an exponential backoff.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self { base }
    }
}

impl BackoffStrategy for Exponential {
    fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Randomizes another strategy by a jitter fraction.
///
/// Each delay `d` of the inner strategy becomes `d * m`, where `m` is drawn
/// uniformly from `[1 - jitter, 1 + jitter)`.
#[derive(Debug, Clone)]
pub struct Jittered<B> {
    inner: B,
    jitter: f64,
    source: Arc<dyn JitterSource>,
}

impl<B: BackoffStrategy> Jittered<B> {
    /// Wrap a strategy, drawing from the process-wide [`SharedRandom`].
    ///
    /// Fractions outside `[0.0, 1.0)` are replaced by
    /// [`DEFAULT_JITTER`](crate::jitter::DEFAULT_JITTER).
    pub fn new(inner: B, jitter: f64) -> Self {
        Self::with_source(inner, jitter, Arc::new(SharedRandom))
    }

    /// Wrap a strategy with an explicit random source.
    pub fn with_source(inner: B, jitter: f64, source: Arc<dyn JitterSource>) -> Self {
        Self {
            inner,
            jitter: jitter::normalize(jitter),
            source,
        }
    }

    /// The effective jitter fraction.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: BackoffStrategy> BackoffStrategy for Jittered<B> {
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.inner.delay(attempt);
        if self.jitter == 0.0 {
            return base;
        }
        let multiplier = 1.0 + self.jitter * (self.source.sample() * 2.0 - 1.0);
        Duration::try_from_secs_f64(base.as_secs_f64() * multiplier).unwrap_or(Duration::MAX)
    }
}
