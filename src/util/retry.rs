//! Backoff for transient Google API failures.
//!
//! A rate-limited response that names its own wait (`Retry-After`) is honoured
//! up to [`RetryPolicy::max_backoff`]. Everything else backs off exponentially
//! from [`RetryPolicy::initial_backoff`]. With jitter on, a computed delay is
//! scaled into `[delay / 2, delay]`, so it never exceeds the cap.

use std::future::Future;
use std::time::Duration;

use crate::error::ExtkitError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Ceiling for every delay, server hints included.
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based) after `error`.
    pub fn delay_for(&self, retry: u32, error: &ExtkitError) -> Duration {
        if let Some(hint) = error.retry_after() {
            return hint.min(self.max_backoff);
        }

        let cap = self.max_backoff.as_secs_f64();
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let mut secs = (self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent))
            .min(cap);
        if self.jitter {
            secs *= 0.5 + unit_interval() * 0.5;
        }
        if !secs.is_finite() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs.clamp(0.0, cap))
    }

    /// Run `operation`, retrying while the error is
    /// [retryable](ExtkitError::is_retryable) and attempts remain.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ExtkitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExtkitError>>,
    {
        if self.max_attempts == 0 {
            return Err(ExtkitError::InvalidArgument(
                "retry policy needs at least one attempt".to_string(),
            ));
        }

        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= self.max_attempts || !err.is_retryable() {
                return Err(err);
            }

            let delay = self.delay_for(attempt, &err);
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Google API call failed, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Uniform sample in `[0, 1)` taken from a fresh v4 uuid.
fn unit_interval() -> f64 {
    let bits = (uuid::Uuid::new_v4().as_u128() >> 75) as u64;
    bits as f64 / (1u64 << 53) as f64
}
