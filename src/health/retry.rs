//! Exponential-backoff retry policy and combinator.

use std::future::Future;
use std::time::Duration;

use log::debug;

/// Backoff behavior for a retried operation.
///
/// The first retry waits `base_delay`, each subsequent one multiplies the
/// previous wait by `multiplier`. The default probe policy allows five
/// retries after the initial attempt, waiting 1s, 2s, 4s, 8s, 16s before
/// giving up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
            multiplier,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(6, Duration::from_secs(1), 2)
    }
}

/// Runs `operation` until it succeeds or the policy's attempt budget is
/// exhausted, returning the last observed error.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.base_delay;
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_attempts.max(1) {
                    return Err(e);
                }
                debug!(
                    "attempt {}/{} failed: {} - retrying in {:?}",
                    attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay *= policy.multiplier;
                attempt += 1;
            }
        }
    }
}
