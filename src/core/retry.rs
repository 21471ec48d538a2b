//! Bounded retry for provider calls.
//!
//! Only errors whose [`Retryable::is_retryable`] returns true are retried; everything
//! else surfaces on the first failure. Delays grow exponentially with optional jitter.

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Outcome of a call that did not succeed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The error was not retryable, or the attempt budget ran out
    #[error("gave up after {attempts} attempt(s)")]
    GaveUp { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    pub fn into_last_error(self) -> E {
        match self {
            RetryError::GaveUp { last_error, .. } => last_error,
        }
    }
}

/// Retry strategy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for provider calls, sized from `config::provider::MAX_RETRIES`.
    pub fn provider() -> Self {
        Self::default().max_retries(crate::core::config::provider::MAX_RETRIES)
    }

    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn no_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delay = if self.add_jitter {
            // up to 25% jitter
            capped + rand::random::<f64>() * 0.25 * capped
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }
}

/// Result of a retried call.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    pub result: Result<T, RetryError<E>>,
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Drops the bookkeeping and returns the plain result with the last error.
    pub fn into_result(self) -> Result<T, E> {
        self.result.map_err(RetryError::into_last_error)
    }
}

/// Determines if an error is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or the
/// retry budget in `config` is spent.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }
            Err(e) if attempts <= config.max_retries && e.is_retryable() => {
                let delay = config.delay_for_attempt(attempts - 1);

                log::warn!(
                    "Attempt {}/{} failed (retrying in {:?}): {:?}",
                    attempts,
                    config.max_retries + 1,
                    delay,
                    e
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryResult {
                    result: Err(RetryError::GaveUp { attempts, last_error: e }),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }
        }
    }
}
