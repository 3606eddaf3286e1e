//! Verdict of a single attempt.

/// What an operation reports after one attempt.
///
/// The operation decides whether its failure is worth another attempt; the
/// engine only enforces the attempt budget and the backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed transiently and should be retried.
    ///
    /// The error may be absent. If the budget runs out after such an
    /// attempt, the exhaustion error carries no cause.
    Retry(Option<E>),
    /// The attempt failed permanently.
    Fail(E),
}

impl<T, E> Outcome<T, E> {
    /// Transient failure with a cause.
    pub fn transient(error: E) -> Self {
        Self::Retry(Some(error))
    }

    /// Permanent failure.
    pub fn permanent(error: E) -> Self {
        Self::Fail(error)
    }

    /// Check if the engine should try again.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Get the error carried by this outcome, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Success(_) => None,
            Self::Retry(error) => error.as_ref(),
            Self::Fail(error) => Some(error),
        }
    }

    /// Classify a result with a retry predicate.
    ///
    /// Errors for which `retryable` returns true become transient failures,
    /// all others permanent ones.
    pub fn from_result(result: Result<T, E>, retryable: impl FnOnce(&E) -> bool) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) if retryable(&error) => Self::transient(error),
            Err(error) => Self::Fail(error),
        }
    }
}

impl<E> Outcome<(), E> {
    /// Build an outcome from a `(retry, error)` pair.
    ///
    /// `(false, None)` is success, `(false, Some)` a permanent failure and
    /// `(true, _)` a transient one, with or without a cause.
    pub fn from_parts(retry: bool, error: Option<E>) -> Self {
        match (retry, error) {
            (true, error) => Self::Retry(error),
            (false, Some(error)) => Self::Fail(error),
            (false, None) => Self::Success(()),
        }
    }
}
