//! Uniform retry-with-backoff for outbound calls.
//!
//! Every external call (sentiment feeds, AI classifier, order submission)
//! goes through one [`RetryPolicy`] so attempt limits and backoff schedules
//! are configured in one place.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry settings, deserializable from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: u64::try_from(initial_backoff.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    /// Single attempt, no waiting.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Builder method to set the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Builder method to set the backoff ceiling.
    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry` (1-based): `initial * multiplier^(retry-1)`,
    /// capped at `max_backoff_ms`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let raw = self.initial_backoff_ms as f64 * factor;
        #[allow(clippy::cast_precision_loss)]
        let capped = raw.min(self.max_backoff_ms as f64);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Runs `op` until it succeeds, returns a non-retryable error, or attempts
    /// are exhausted. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        operation: &str,
        mut op: F,
        is_retryable: R,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let max = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt < max && is_retryable(&e) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation,
                        attempt,
                        max,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!("{} gave up after {} attempt(s): {}", operation, attempt, e);
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
            }
        }
    }

    /// Convenience wrapper around [`run`](Self::run) that drops the attempt count.
    ///
    /// # Errors
    /// Returns the last error produced by `op`.
    pub async fn retry<T, E, F, Fut, R>(&self, operation: &str, op: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        self.run(operation, op, is_retryable).await.result
    }
}
