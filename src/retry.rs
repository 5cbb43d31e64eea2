//! Bounded exponential backoff around an async operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::logging::{ConnectionLogger, TracingLogger};

/// Retry policy applied around connection attempts.
///
/// The defaults give 5 attempts in total with waits of 2s, 4s, 8s and 16s
/// between them. No jitter is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    factor: f64,
    max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            factor: 2.0,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of attempts, including the first one. Clamped to at least 1.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Wait before the second attempt.
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Multiplier applied to the wait after every failed attempt.
    ///
    /// Must be finite and at least 1.0; anything else leaves the current factor in place.
    #[must_use]
    pub fn factor(mut self, factor: f64) -> Self {
        if Self::is_valid_factor(factor) {
            self.factor = factor;
        }
        self
    }

    #[must_use]
    pub fn is_valid_factor(factor: f64) -> bool {
        factor.is_finite() && factor >= 1.0
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Option<Duration>) -> Self {
        self.max_delay = delay;
        self
    }

    /// Policy that runs the operation exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().max_attempts(1)
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let delay = if secs.is_finite() {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Full wait schedule, one entry per gap between attempts.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_after(a)).collect()
    }

    /// Run `operation` until it succeeds or the attempt budget is spent, logging failed
    /// attempts through `tracing`.
    ///
    /// # Errors
    /// Returns the error of the final attempt, unchanged.
    pub async fn retry<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_logged(&TracingLogger, operation).await
    }

    /// [`RetryPolicy::retry`] with failed attempts reported to `logger` at warning severity.
    ///
    /// # Errors
    /// Returns the error of the final attempt, unchanged.
    pub async fn retry_logged<L, F, Fut, T, E>(
        &self,
        logger: &L,
        mut operation: F,
    ) -> Result<T, E>
    where
        L: ConnectionLogger + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    logger.warning(&format!(
                        "giving up after {} attempts: {err}",
                        self.max_attempts
                    ));
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    logger.warning(&format!(
                        "attempt {attempt}/{} failed: {err}; retrying in {delay:?}",
                        self.max_attempts
                    ));
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
