//! Unconditional retry with exponential backoff.
//!
//! Unlike a retry helper that pattern-matches an error message to decide
//! whether it is worth retrying, every failure here is retried up to the
//! configured attempt count — there is no notion of a non-retryable
//! failure in the operations this module backs.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Options for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 8,
            initial_delay_ms: 100,
        }
    }
}

impl RetryOptions {
    fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.initial_delay_ms * 2u64.pow(attempt))
    }
}

/// Retry an async operation with exponential backoff, unconditionally on
/// any error, doubling the delay after each attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    options: &RetryOptions,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= options.max_retries {
                    return Err(error);
                }

                let delay = options.delay_for(attempt);
                tracing::warn!(
                    "attempt {} failed: {}. retrying in {:?}",
                    attempt + 1,
                    error,
                    delay
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
