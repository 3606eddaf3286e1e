//! Retry policy: attempt budget plus backoff sequence.

use crate::backoff::{Exponential, Jittered, Linear};
use crate::config::RetryConfig;
use crate::jitter;
use crate::strategy::BackoffStrategy;
use std::sync::Arc;
use std::time::Duration;

/// Immutable retry policy.
///
/// Cloning is cheap and a policy can be shared by any number of concurrent
/// runs; running never modifies it.
///
/// # Example
///
/// ```ignore
/// use retry_engine::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::attempts(5)
///     .exponential_jitter_backoff(Duration::from_millis(100), 0.25);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Option<Arc<dyn BackoffStrategy>>,
}

impl RetryPolicy {
    /// Create a policy from a plain configuration.
    pub fn new(config: RetryConfig) -> Self {
        let policy = Self::attempts(config.attempts);
        if config.exponential {
            policy.exponential_jitter_backoff(config.backoff, config.jitter)
        } else {
            policy.jitter_backoff(config.backoff, config.jitter)
        }
    }

    /// Create a policy allowing `max_attempts` calls with no backoff.
    ///
    /// A budget of zero never calls the operation.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: None,
        }
    }

    /// Wait a constant `duration` between calls.
    #[must_use]
    pub fn backoff(self, duration: Duration) -> Self {
        self.jitter_backoff(duration, 0.0)
    }

    /// Wait `duration * 2^attempt` after the failed attempt with index
    /// `attempt`: 100ms gives 100ms after the first call, 800ms after the
    /// fourth, 1600ms after the fifth.
    #[must_use]
    pub fn exponential_backoff(self, duration: Duration) -> Self {
        self.exponential_jitter_backoff(duration, 0.0)
    }

    /// Constant backoff with jitter.
    ///
    /// A zero `duration` disables backoff. `jitter` is expected in
    /// `[0.0, 1.0)`; other values fall back to
    /// [`DEFAULT_JITTER`](crate::jitter::DEFAULT_JITTER).
    #[must_use]
    pub fn jitter_backoff(mut self, duration: Duration, jitter: f64) -> Self {
        self.backoff = backoff_from(Linear::new(duration), duration, jitter);
        self
    }

    /// Exponential backoff with jitter.
    ///
    /// Same rules as [`jitter_backoff`](Self::jitter_backoff) for
    /// `duration` and `jitter`.
    #[must_use]
    pub fn exponential_jitter_backoff(mut self, duration: Duration, jitter: f64) -> Self {
        self.backoff = backoff_from(Exponential::new(duration), duration, jitter);
        self
    }

    /// Use a custom backoff strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl BackoffStrategy + 'static) -> Self {
        self.backoff = Some(Arc::new(strategy));
        self
    }

    /// Remove any backoff.
    #[must_use]
    pub fn without_backoff(mut self) -> Self {
        self.backoff = None;
        self
    }

    /// Maximum number of operation calls.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The configured backoff strategy.
    pub fn strategy(&self) -> Option<&dyn BackoffStrategy> {
        self.backoff.as_deref()
    }

    /// Wait after the failed attempt with index `attempt`, if backoff is on.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        self.backoff.as_ref().map(|backoff| backoff.delay(attempt))
    }

    /// Check if the engine will wait between attempts.
    ///
    /// False when no backoff is configured or when fewer than two attempts
    /// are allowed.
    pub fn waits_between_attempts(&self) -> bool {
        self.backoff.is_some() && self.max_attempts >= 2
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config)
    }
}

fn backoff_from<B>(base: B, duration: Duration, jitter: f64) -> Option<Arc<dyn BackoffStrategy>>
where
    B: BackoffStrategy + 'static,
{
    if duration.is_zero() {
        return None;
    }
    let jitter = jitter::normalize(jitter);
    if jitter == 0.0 {
        Some(Arc::new(base))
    } else {
        Some(Arc::new(Jittered::new(base, jitter)))
    }
}
