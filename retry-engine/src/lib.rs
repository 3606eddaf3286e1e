//! # retry-engine
//!
//! Retry fallible async operations with constant, exponential or jittered
//! backoff, bounded by an attempt budget and an external cancellation
//! signal.
//!
//! ## Core Concepts
//!
//! - **[`Outcome`]**: What an operation reports after each attempt
//! - **[`RetryPolicy`]**: Attempt budget plus an optional backoff sequence
//! - **[`BackoffStrategy`]**: Maps a failed attempt's index to a wait
//! - **[`Cancellation`]**: Signal that stops a run before the next attempt
//! - **[`RetryError`]**: Permanent failure, exhaustion or cancellation
//!
//! The operation decides whether a failure is worth retrying. The engine
//! only counts attempts, waits, and watches the signal.
//!
//! ## Backoff
//!
//! - [`Linear`]: Constant delay between attempts
//! - [`Exponential`]: Delay doubling after every failed attempt
//! - [`Jittered`]: Random perturbation of another strategy
//! - [`FnBackoff`]: Any closure from attempt index to delay
//!
//! ## Configuration
//!
//! A policy can be built three equivalent ways:
//!
//! ```ignore
//! use retry_engine::{
//!     with_attempts, with_backoff, with_exponential, with_jitter, RetryConfig, RetryPolicy,
//! };
//! use std::time::Duration;
//!
//! // Fluent
//! let a = RetryPolicy::attempts(2).exponential_jitter_backoff(Duration::from_millis(1), 0.25);
//!
//! // Functional options
//! let b = RetryPolicy::new(RetryConfig::from_options([
//!     with_attempts(2),
//!     with_backoff(Duration::from_millis(1)),
//!     with_exponential(),
//!     with_jitter(0.25),
//! ]));
//!
//! // Plain struct
//! let c = RetryPolicy::new(RetryConfig {
//!     attempts: 2,
//!     backoff: Duration::from_millis(1),
//!     exponential: true,
//!     jitter: 0.25,
//! });
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use retry_engine::{Outcome, RetryPolicy};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let policy = RetryPolicy::attempts(5).exponential_backoff(Duration::from_millis(100));
//!
//! let body = policy
//!     .run(&token, || async {
//!         match fetch().await {
//!             Ok(body) => Outcome::Success(body),
//!             Err(err) if err.is_timeout() => Outcome::transient(err),
//!             Err(err) => Outcome::permanent(err),
//!         }
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod jitter;
pub mod outcome;
pub mod policy;
pub mod strategy;

// Re-exports
pub use backoff::{Exponential, Jittered, Linear};
pub use cancel::{CancelScope, Cancellation, Cancelled, NeverCancel};
pub use config::{with_attempts, with_backoff, with_exponential, with_jitter, RetryConfig, RetryOption};
pub use error::{NoAttemptsLeft, RetryError, RetryResult};
pub use executor::{with_retry, RetryReport};
pub use jitter::{JitterSource, SeededRandom, SharedRandom, DEFAULT_JITTER};
pub use outcome::Outcome;
pub use policy::RetryPolicy;
pub use strategy::{backoff_fn, BackoffStrategy, FnBackoff};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        with_retry, BackoffStrategy, Cancellation, NeverCancel, Outcome, RetryConfig, RetryError,
        RetryPolicy, RetryResult,
    };
}
