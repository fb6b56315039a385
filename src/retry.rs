//! Generic call-with-retry helper.
//!
//! Runs an async operation under a [`RetryPolicy`]: transient failures
//! are retried with exponential backoff until the attempt budget is spent;
//! a non-transient failure stops immediately.

use context_bench_core::retry::{RetryPolicy, Retryable};
use std::fmt::Display;
use std::future::Future;

/// The error of the final attempt, plus how many attempts were made.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Call `op` until it succeeds, fails fatally, or the policy runs out.
///
/// `op` receives the 1-based attempt number.
pub async fn call_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_before_retry(attempt);
                tracing::warn!(
                    "{}: attempt {}/{} failed: {}; retrying in {:.1}s",
                    label,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                })
            }
        }
    }
}
