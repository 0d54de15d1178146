//! Bounded exponential-backoff retry for *Dependency-unavailable* RPC calls
//! (§7): the embedding, vector-store, and graph-store clients wrap their
//! transport-level requests in [`with_retry`], retrying only the errors the
//! caller marks transient and logging at `error` once attempts are
//! exhausted rather than silently giving up after one try.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(1_u64 << attempt.min(20));
    let capped = exponential.min(config.max_delay.as_millis() as u64);
    let jitter = fastrand::u64(0..=capped / 2 + 1);
    Duration::from_millis(capped + jitter)
}

/// Runs `operation` up to `config.max_retries + 1` times total, sleeping
/// with exponential backoff between attempts that `is_retryable` accepts as
/// transient. A non-retryable error returns immediately on first
/// occurrence; a retryable error returns once attempts are exhausted,
/// logged at `error` level (§7's "exhausted-retry" path).
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                if attempt >= config.max_retries {
                    tracing::error!(attempts = attempt + 1, "dependency RPC failed after exhausting retries");
                    return Err(err);
                }
                let delay = backoff_delay(config, attempt);
                tracing::warn!(attempt, ?delay, "dependency RPC failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
