// Bounded retry with exponential backoff and jitter
//
// Shared by acquisition (downloads) and publication (uploads). Transient
// errors (as classified by `StitchError::is_transient`) are retried up to
// `max_attempts`; everything else surfaces immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, StitchError};

/// Retry policy: attempt count and backoff schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so 3 means "retry twice")
    pub max_attempts: u32,
    /// Base delay; actual delay = base * 2^attempt, plus jitter
    pub base_delay: Duration,
    /// Hard cap on the computed delay
    pub max_delay: Duration,
    /// Adds random jitter of [0, base/2) to avoid thundering herd
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries, for tests and one-shot operations
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Compute the delay before retrying after `attempt` (0-indexed).
    ///
    /// The shift saturates so a misconfigured attempt count cannot overflow.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exp_delay = self
            .base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay);
        let capped = exp_delay.min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let jitter_range_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;
        if jitter_range_ms == 0 {
            return capped;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..jitter_range_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }

    /// Execute `operation`, retrying transient failures with backoff.
    pub async fn run<F, Fut, T>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        what,
                        attempt = attempt + 1,
                        max = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        // Unreachable: the loop always returns on the final attempt
        Err(last_err
            .unwrap_or_else(|| StitchError::Internal(anyhow::anyhow!("retry loop exited early"))))
    }
}
