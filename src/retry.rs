use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    Fixed(Duration),
    /// `min(base * 2^retry, max)` plus a random jitter in `0..base`.
    Exponential { base: Duration, max: Duration },
}

/// Execution policy for network calls: how often to try, and how long to
/// wait in between. Knows nothing about what is being retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(2),
                max: Duration::from_secs(60),
            },
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_retries` retries after the first attempt and
    /// exponential backoff starting at `base_delay_secs`.
    pub fn exponential(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            backoff: Backoff::Exponential {
                base: Duration::from_secs(base_delay_secs),
                max: Duration::from_secs(60),
            },
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
                let capped = base.saturating_mul(factor).min(max);
                let base_ms = base.as_millis() as u64;
                let jitter = if base_ms > 0 {
                    rand::thread_rng().gen_range(0..base_ms)
                } else {
                    0
                };
                capped + Duration::from_millis(jitter)
            }
        }
    }
}

/// Run `operation` under `policy`.
///
/// `classifier` decides whether a failure is worth another attempt. Returns the
/// first `Ok`, or the last error unchanged once attempts run out or the
/// classifier aborts. `label` only appears in log lines.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    policy: &RetryPolicy,
    label: &str,
    classifier: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };
        attempt += 1;
        if classifier(&err) == RetryAction::Abort || attempt >= total_attempts {
            return Err(err);
        }
        let delay = policy.delay_for_retry(attempt - 1);
        tracing::warn!(
            "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
            label,
            attempt,
            total_attempts,
            delay.as_secs_f64(),
            err
        );
        tokio::time::sleep(delay).await;
    }
}
