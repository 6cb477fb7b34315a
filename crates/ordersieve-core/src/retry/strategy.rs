//! Retry strategy trait and the transience marker for error types.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Marker for errors that can declare themselves transient.
///
/// Error enums implement this so a [`BackoffStrategy`] can stop retrying
/// as soon as a permanent failure shows up: a budget denial or a 4xx will
/// never heal, a timeout or a 5xx might.
pub trait Retryable {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

/// A strategy for retrying failed operations with backoff.
///
/// Implementations decide how long to wait between attempts and when to
/// give up. The operation's own error type decides, through [`Retryable`],
/// whether a particular failure is worth another attempt at all.
#[async_trait]
pub trait BackoffStrategy: Send + Sync {
    /// Execute an operation, retrying transient failures.
    ///
    /// The operation runs until it succeeds, returns a non-retryable
    /// error, or exhausts `max_retries` additional attempts after the
    /// first one.
    async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Retryable + Send + Sync + 'static,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_retries() => return Err(err),
                Err(_) => {
                    if let Some(delay) = self.next_delay(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Delay before the retry following failed attempt `attempt`
    /// (0-indexed: `next_delay(0)` precedes the second try).
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Maximum number of retries after the initial attempt.
    fn max_retries(&self) -> u32;
}
