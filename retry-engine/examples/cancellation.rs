//! Cancellation example.
//!
//! Retries an operation that never recovers under a deadline. The deadline
//! fires while the engine waits between attempts, and the run stops with
//! `deadline exceeded` instead of exhausting its budget.
//!
//! Run with:
//! ```bash
//! RUST_LOG=retry_engine=debug cargo run --example cancellation
//! ```

use retry_engine::prelude::*;
use retry_engine::CancelScope;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let scope = CancelScope::new().with_timeout(Duration::from_millis(300));
    let policy = RetryPolicy::attempts(10).exponential_backoff(Duration::from_millis(50));

    let (result, report) = policy
        .run_with_report(&scope, || async {
            Outcome::<(), _>::transient(anyhow::anyhow!("service unavailable"))
        })
        .await;

    println!("attempts: {}", report.attempts);
    println!("scheduled waits: {:?}", report.waits);

    match result {
        Err(RetryError::Cancelled(reason)) => println!("stopped: {reason}"),
        Err(err) => anyhow::bail!("retry failed: {err}"),
        Ok(()) => println!("recovered"),
    }
    Ok(())
}
