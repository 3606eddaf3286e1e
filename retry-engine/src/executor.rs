//! Retry executor for running operations with retries.

use crate::cancel::Cancellation;
use crate::config::{RetryConfig, RetryOption};
use crate::error::{NoAttemptsLeft, RetryError, RetryResult};
use crate::outcome::Outcome;
use crate::policy::RetryPolicy;
use crate::strategy::BackoffStrategy;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::{debug, warn};

/// Far-future fallback for waits that overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// What happened during a retry run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Number of operation calls.
    pub attempts: u32,
    /// Backoff waits started, in order.
    ///
    /// A wait interrupted by cancellation is still recorded.
    pub waits: Vec<Duration>,
}

impl RetryReport {
    /// Total backoff time scheduled.
    pub fn total_wait(&self) -> Duration {
        self.waits.iter().sum()
    }
}

/// Run an operation with a policy built from options.
///
/// # Example
///
/// ```ignore
/// use retry_engine::{with_attempts, with_backoff, with_retry, NeverCancel, Outcome};
/// use std::time::Duration;
///
/// let result = with_retry(
///     &NeverCancel,
///     || async { Outcome::<_, std::io::Error>::Success("done") },
///     [with_attempts(3), with_backoff(Duration::from_millis(10))],
/// )
/// .await;
/// ```
pub async fn with_retry<C, F, Fut, T, E>(
    signal: &C,
    operation: F,
    options: impl IntoIterator<Item = RetryOption>,
) -> RetryResult<T, E>
where
    C: Cancellation + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T, E>>,
{
    RetryPolicy::new(RetryConfig::from_options(options))
        .run(signal, operation)
        .await
}

impl RetryPolicy {
    /// Call `operation` until it stops asking for a retry, the attempt
    /// budget runs out, or `signal` fires.
    ///
    /// Without backoff the signal is checked before every call. With
    /// backoff every call is made and the signal is raced against the wait
    /// that follows a failed call; when both are ready, cancellation wins.
    /// A call in progress is never interrupted.
    pub async fn run<C, F, Fut, T, E>(&self, signal: &C, operation: F) -> RetryResult<T, E>
    where
        C: Cancellation + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
    {
        let mut report = RetryReport::default();
        self.execute(signal, operation, &mut report).await
    }

    /// Same as [`run`](Self::run), also returning what happened.
    pub async fn run_with_report<C, F, Fut, T, E>(
        &self,
        signal: &C,
        operation: F,
    ) -> (RetryResult<T, E>, RetryReport)
    where
        C: Cancellation + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
    {
        let mut report = RetryReport::default();
        let result = self.execute(signal, operation, &mut report).await;
        (result, report)
    }

    async fn execute<C, F, Fut, T, E>(
        &self,
        signal: &C,
        operation: F,
        report: &mut RetryReport,
    ) -> RetryResult<T, E>
    where
        C: Cancellation + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
    {
        match self.strategy() {
            Some(backoff) if self.max_attempts() >= 2 => {
                self.run_with_backoff(backoff, signal, operation, report).await
            }
            _ => self.run_without_backoff(signal, operation, report).await,
        }
    }

    async fn run_without_backoff<C, F, Fut, T, E>(
        &self,
        signal: &C,
        mut operation: F,
        report: &mut RetryReport,
    ) -> RetryResult<T, E>
    where
        C: Cancellation + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
    {
        let max_attempts = self.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if let Some(reason) = signal.reason() {
                debug!(attempt, %reason, "Retry cancelled before attempt");
                return Err(RetryError::Cancelled(reason));
            }

            debug!(attempt, max_attempts, "Executing retry attempt");
            report.attempts += 1;

            match operation().await {
                Outcome::Success(value) => return Ok(value),
                Outcome::Fail(error) => {
                    warn!(attempt, "Operation failed permanently");
                    return Err(RetryError::Permanent(error));
                }
                Outcome::Retry(error) => last_error = error,
            }
        }

        warn!(attempts = report.attempts, "Retry attempts exhausted");
        Err(NoAttemptsLeft::new(last_error).into())
    }

    async fn run_with_backoff<C, F, Fut, T, E>(
        &self,
        backoff: &dyn BackoffStrategy,
        signal: &C,
        mut operation: F,
        report: &mut RetryReport,
    ) -> RetryResult<T, E>
    where
        C: Cancellation + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
    {
        let max_attempts = self.max_attempts();
        let mut last_error = None;
        // Created on the first wait only; most operations succeed on the
        // first call. Dropped on every return.
        let mut timer: Option<Pin<Box<Sleep>>> = None;

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, "Executing retry attempt");
            report.attempts += 1;

            match operation().await {
                Outcome::Success(value) => return Ok(value),
                Outcome::Fail(error) => {
                    warn!(attempt, "Operation failed permanently");
                    return Err(RetryError::Permanent(error));
                }
                Outcome::Retry(error) => last_error = error,
            }

            if attempt == max_attempts {
                break;
            }

            // the sequence is indexed by failed attempts, starting at 0
            let wait = backoff.delay(attempt - 1);
            report.waits.push(wait);
            debug!(
                attempt,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Waiting before retry"
            );

            let deadline = deadline_after(wait);
            let sleep = timer.get_or_insert_with(|| Box::pin(sleep_until(deadline)));
            sleep.as_mut().reset(deadline);

            tokio::select! {
                biased;
                reason = signal.cancelled() => {
                    debug!(attempt, %reason, "Retry cancelled during backoff");
                    return Err(RetryError::Cancelled(reason));
                }
                () = sleep.as_mut() => {}
            }
        }

        warn!(attempts = report.attempts, "Retry attempts exhausted");
        Err(NoAttemptsLeft::new(last_error).into())
    }
}

fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::Linear;
    use crate::cancel::{CancelScope, Cancelled, NeverCancel};
    use crate::config::{with_attempts, with_backoff, with_exponential, with_jitter};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    /// Operation that always asks for a retry with the given message.
    fn always_retry(
        calls: &Arc<AtomicU32>,
        message: &'static str,
    ) -> impl FnMut() -> std::future::Ready<Outcome<(), anyhow::Error>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Outcome::transient(anyhow::anyhow!(message)))
        }
    }

    fn policies() -> Vec<RetryPolicy> {
        vec![
            RetryPolicy::attempts(4),
            RetryPolicy::attempts(4).backoff(Duration::from_millis(1)),
            RetryPolicy::attempts(4).exponential_backoff(Duration::from_millis(1)),
            RetryPolicy::attempts(4).exponential_jitter_backoff(Duration::from_millis(1), 0.5),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_every_budget() {
        for n in 1..=5 {
            for policy in [
                RetryPolicy::attempts(n),
                RetryPolicy::attempts(n).backoff(Duration::from_millis(3)),
            ] {
                let calls = counter();
                let result = policy.run(&NeverCancel, always_retry(&calls, "boom")).await;

                assert_eq!(calls.load(Ordering::SeqCst), n);
                let err = result.unwrap_err();
                assert!(err.is_exhausted());
                assert_eq!(err.to_string(), "no attempts left: boom");
                assert_eq!(err.into_cause().map(|e| e.to_string()), Some("boom".into()));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success() {
        for policy in policies() {
            let calls = counter();
            let c = calls.clone();
            let (result, report) = policy
                .run_with_report(&NeverCancel, || {
                    c.fetch_add(1, Ordering::SeqCst);
                    async { Outcome::<_, anyhow::Error>::Success(42) }
                })
                .await;

            assert_eq!(result.unwrap(), 42);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(report.waits.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_wrapped() {
        for policy in policies() {
            for k in 1..=4u32 {
                let calls = counter();
                let c = calls.clone();
                let result = policy
                    .run(&NeverCancel, || {
                        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                        async move {
                            if n < k {
                                Outcome::<(), _>::transient(std::io::Error::other("again"))
                            } else {
                                Outcome::permanent(std::io::Error::new(
                                    std::io::ErrorKind::PermissionDenied,
                                    "denied",
                                ))
                            }
                        }
                    })
                    .await;

                assert_eq!(calls.load(Ordering::SeqCst), k);
                match result {
                    Err(RetryError::Permanent(err)) => {
                        assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied)
                    }
                    other => panic!("expected permanent failure, got {other:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let token = CancellationToken::new();
        token.cancel();

        let calls = counter();
        let result = RetryPolicy::attempts(3)
            .run(&token, always_retry(&calls, "never"))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.unwrap_err().cancelled(), Some(Cancelled::Canceled));
    }

    #[tokio::test]
    async fn test_cancelled_between_calls_without_backoff() {
        let token = CancellationToken::new();
        let calls = counter();
        let c = calls.clone();
        let t = token.clone();

        let result = RetryPolicy::attempts(5)
            .run(&token, || {
                if c.fetch_add(1, Ordering::SeqCst) == 1 {
                    t.cancel();
                }
                async { Outcome::<(), _>::transient("busy") }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_zero_attempts() {
        for policy in [
            RetryPolicy::attempts(0),
            RetryPolicy::attempts(0).backoff(Duration::from_secs(1)),
        ] {
            let calls = counter();
            let result = policy.run(&NeverCancel, always_retry(&calls, "unused")).await;

            assert_eq!(calls.load(Ordering::SeqCst), 0);
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "no attempts left");
            assert!(err.into_cause().is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_without_cause() {
        let policy = RetryPolicy::attempts(2).backoff(Duration::from_millis(1));
        let result = policy
            .run(&NeverCancel, || async {
                Outcome::<(), std::io::Error>::Retry(None)
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.to_string(), "no attempts left");
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_two_attempts_waits_once() {
        let policy = RetryPolicy::attempts(2).jitter_backoff(Duration::from_millis(1), 0.0);
        let calls = counter();

        let start = Instant::now();
        let (result, report) = policy
            .run_with_report(&NeverCancel, always_retry(&calls, "x"))
            .await;

        assert_eq!(result.unwrap_err().to_string(), "no attempts left: x");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.waits, vec![Duration::from_millis(1)]);
        assert_eq!(start.elapsed(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_no_backoff_eventual_success() {
        let calls = counter();
        let c = calls.clone();
        let result = RetryPolicy::attempts(5)
            .run(&NeverCancel, || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Outcome::transient("y")
                    } else {
                        Outcome::Success(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_waits() {
        let policy = RetryPolicy::attempts(5).exponential_backoff(Duration::from_millis(100));
        let calls = counter();

        let start = Instant::now();
        let (_, report) = policy
            .run_with_report(&NeverCancel, always_retry(&calls, "slow"))
            .await;

        assert_eq!(
            report.waits,
            [100, 200, 400, 800].map(Duration::from_millis).to_vec()
        );
        assert_eq!(report.total_wait(), Duration::from_millis(1500));
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let policy = RetryPolicy::attempts(3).exponential_backoff(Duration::from_millis(100));
        let calls = counter();
        let start = Instant::now();
        let (result, report) = policy
            .run_with_report(&token, always_retry(&calls, "flaky"))
            .await;

        assert_eq!(result.unwrap_err().cancelled(), Some(Cancelled::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.waits, vec![Duration::from_millis(100)]);
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_backoff_calls_first_even_if_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let calls = counter();
        let result = RetryPolicy::attempts(3)
            .backoff(Duration::from_secs(60))
            .run(&token, always_retry(&calls, "late"))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_backoff() {
        let scope = CancelScope::new().with_timeout(Duration::from_millis(250));
        let policy = RetryPolicy::attempts(10).backoff(Duration::from_millis(100));
        let calls = counter();

        let result = policy.run(&scope, always_retry(&calls, "down")).await;

        assert_eq!(result.unwrap_err().cancelled(), Some(Cancelled::DeadlineExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_backoff_is_cancellable() {
        let token = CancellationToken::new();
        let policy = RetryPolicy::attempts(2).with_strategy(Linear::new(Duration::MAX));
        let calls = counter();
        let c = calls.clone();
        let t = token.clone();

        let result = policy
            .run(&token, || {
                c.fetch_add(1, Ordering::SeqCst);
                t.cancel();
                async { Outcome::<(), _>::transient("wait forever") }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_options() {
        let mut calls = 0;
        let result = with_retry(
            &NeverCancel,
            || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Outcome::transient(anyhow::anyhow!("needs 3 attempts"))
                    } else {
                        Outcome::Success(())
                    }
                }
            },
            [
                with_attempts(2),
                with_backoff(Duration::from_millis(1)),
                with_exponential(),
                with_jitter(0.25),
            ],
        )
        .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "no attempts left: needs 3 attempts"
        );
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_is_reusable() {
        let policy = RetryPolicy::attempts(3).backoff(Duration::from_millis(2));
        for _ in 0..3 {
            let calls = counter();
            let (_, report) = policy
                .run_with_report(&NeverCancel, always_retry(&calls, "again"))
                .await;
            assert_eq!(report.attempts, 3);
            assert_eq!(report.waits.len(), 2);
        }
        assert_eq!(policy.max_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_share_policy() {
        let policy =
            Arc::new(RetryPolicy::attempts(3).jitter_backoff(Duration::from_millis(10), 0.5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = policy.clone();
                tokio::spawn(async move {
                    let calls = counter();
                    let result = policy.run(&NeverCancel, always_retry(&calls, "busy")).await;
                    (result.is_err(), calls.load(Ordering::SeqCst))
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), (true, 3));
        }
    }
}
