//! Configuration styles example.
//!
//! Runs the same flaky operation under a policy built three ways: fluent
//! calls, functional options and a plain config struct. The operation needs
//! three attempts but only two are allowed, so every run ends with
//! `no attempts left: needs 3 attempts`.
//!
//! Run with:
//! ```bash
//! RUST_LOG=retry_engine=debug cargo run --example config_styles
//! ```

use retry_engine::prelude::*;
use retry_engine::{with_attempts, with_backoff, with_exponential, with_jitter};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Build an operation that fails until its third call.
fn needs_three_attempts() -> impl FnMut() -> std::future::Ready<Outcome<(), anyhow::Error>> {
    let mut calls = 0;
    move || {
        calls += 1;
        std::future::ready(if calls < 3 {
            Outcome::transient(anyhow::anyhow!("needs 3 attempts"))
        } else {
            Outcome::Success(())
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backoff = Duration::from_millis(1);

    // Fluent
    let fluent = RetryPolicy::attempts(2)
        .exponential_jitter_backoff(backoff, 0.25)
        .run(&NeverCancel, needs_three_attempts())
        .await;
    print_result("fluent", fluent);

    // Functional options
    let options = with_retry(
        &NeverCancel,
        needs_three_attempts(),
        [
            with_attempts(2),
            with_backoff(backoff),
            with_exponential(),
            with_jitter(0.25),
        ],
    )
    .await;
    print_result("options", options);

    // Plain struct
    let config = RetryConfig {
        attempts: 2,
        backoff,
        exponential: true,
        jitter: 0.25,
    };
    let plain = RetryPolicy::new(config)
        .run(&NeverCancel, needs_three_attempts())
        .await;
    print_result("struct", plain);
}

fn print_result(style: &str, result: RetryResult<(), anyhow::Error>) {
    match result {
        Ok(()) => println!("{style}: ok"),
        Err(err) => println!("{style}: {err}"),
    }
}
