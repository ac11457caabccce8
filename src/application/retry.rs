//! Bounded exponential-backoff retry for network calls.

use std::future::Future;
use std::time::Duration;

use crate::domain::config::RetryConfig;
use crate::domain::Result;

/// Retry limits for one call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Build a policy; `max_attempts` is raised to 1 and the multiplier to
    /// 1.0 if given lower.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_nan() {
            1.0
        } else {
            backoff_multiplier.max(1.0)
        };
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier,
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_multiplier,
        )
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after a failed attempt `attempt` (1-indexed):
    /// `initial_delay * multiplier^(attempt - 1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        self.initial_delay
            .mul_f64(self.backoff_multiplier.powi(exponent).min(f64::from(u32::MAX)))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up.
///
/// Retryable failures are those [`crate::domain::AppError::is_retryable`] accepts. The last
/// error is returned unchanged once attempts run out.
///
/// # Errors
/// Returns the first non-retryable error, or the final retryable one.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                tracing::warn!(attempts = attempt, error = %err, "Giving up after retries");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
