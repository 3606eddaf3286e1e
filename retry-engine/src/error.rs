//! Retry error types.

use crate::cancel::Cancelled;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Terminal error of a retry run.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation reported a failure that must not be retried.
    ///
    /// Display and source are the operation's own error, unchanged.
    #[error(transparent)]
    Permanent(E),

    /// The attempt budget was consumed without success.
    #[error(transparent)]
    Exhausted(#[from] NoAttemptsLeft<E>),

    /// The cancellation signal fired first.
    #[error(transparent)]
    Cancelled(Cancelled),
}

impl<E> RetryError<E> {
    /// Check if the attempt budget was exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Check if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if the operation failed permanently.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// Get the operation error behind this failure, if any.
    ///
    /// Returns the permanent error, or the last transient error wrapped by
    /// an exhaustion. Cancellation carries no operation error.
    pub fn into_cause(self) -> Option<E> {
        match self {
            Self::Permanent(err) => Some(err),
            Self::Exhausted(exhausted) => exhausted.into_reason(),
            Self::Cancelled(_) => None,
        }
    }

    /// Get the cancellation reason if the run was cancelled.
    pub fn cancelled(&self) -> Option<Cancelled> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Error returned when every permitted attempt asked for a retry.
///
/// Wraps the error of the last attempt; it is `None` when that attempt
/// requested a retry without reporting a cause, or when no attempt ran.
#[derive(Debug)]
pub struct NoAttemptsLeft<E> {
    reason: Option<E>,
}

impl<E> NoAttemptsLeft<E> {
    pub(crate) fn new(reason: Option<E>) -> Self {
        Self { reason }
    }

    /// The last recorded transient error.
    pub fn reason(&self) -> Option<&E> {
        self.reason.as_ref()
    }

    /// Take the last recorded transient error.
    pub fn into_reason(self) -> Option<E> {
        self.reason
    }
}

impl<E: fmt::Display> fmt::Display for NoAttemptsLeft<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "no attempts left: {reason}"),
            None => f.write_str("no attempts left"),
        }
    }
}

impl<E> StdError for NoAttemptsLeft<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.reason.as_ref().map(|err| err as &(dyn StdError + 'static))
    }
}

/// Result type for retry runs.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;
