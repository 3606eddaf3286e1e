//! Retry configuration.
//!
//! [`RetryConfig`] is the plain-struct way to describe a policy. The
//! `with_*` functions build [`RetryOption`]s that fill in a config one field
//! at a time. Both end up in [`RetryPolicy::new`](crate::RetryPolicy::new).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Plain configuration for a retry policy.
///
/// The default value allows zero attempts and no backoff, like an empty
/// config file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of operation calls.
    pub attempts: u32,
    /// Delay after a failed call. Zero disables backoff.
    #[serde(with = "duration_serde")]
    pub backoff: Duration,
    /// Multiply the backoff by 2 raised to the failed attempt's index.
    pub exponential: bool,
    /// Jitter fraction, expected in `[0.0, 1.0)`.
    ///
    /// Values outside the range use
    /// [`DEFAULT_JITTER`](crate::jitter::DEFAULT_JITTER).
    pub jitter: f64,
}

impl RetryConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config by applying options in order.
    pub fn from_options(options: impl IntoIterator<Item = RetryOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }

    /// Set the maximum number of calls.
    #[must_use]
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the backoff delay.
    #[must_use]
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Make the backoff exponential.
    #[must_use]
    pub fn exponential(mut self, exponential: bool) -> Self {
        self.exponential = exponential;
        self
    }

    /// Set the jitter fraction.
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// A single setting applied to a [`RetryConfig`].
pub struct RetryOption(Box<dyn FnOnce(&mut RetryConfig) + Send>);

impl RetryOption {
    /// Create an option from a closure.
    pub fn new(f: impl FnOnce(&mut RetryConfig) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Apply the option.
    pub fn apply(self, config: &mut RetryConfig) {
        (self.0)(config)
    }
}

impl fmt::Debug for RetryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOption").finish_non_exhaustive()
    }
}

/// Set the maximum number of calls.
pub fn with_attempts(attempts: u32) -> RetryOption {
    RetryOption::new(move |config| config.attempts = attempts)
}

/// Set the delay after a failed call.
pub fn with_backoff(backoff: Duration) -> RetryOption {
    RetryOption::new(move |config| config.backoff = backoff)
}

/// Make the backoff exponential.
pub fn with_exponential() -> RetryOption {
    RetryOption::new(|config| config.exponential = true)
}

/// Apply jitter to the backoff.
pub fn with_jitter(jitter: f64) -> RetryOption {
    RetryOption::new(move |config| config.jitter = jitter)
}

mod duration_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        // negative delays mean "no backoff"
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs.max(0.0)).map_err(D::Error::custom)
    }
}
