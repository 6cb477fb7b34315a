//! Exponential backoff with jitter.

use super::strategy::BackoffStrategy;
use std::time::Duration;

/// Exponential backoff strategy with configurable jitter.
///
/// Delays grow as `initial_delay * multiplier^attempt`, capped at
/// `max_delay`. Jitter randomizes each delay within
/// `[base * (1 - jitter), base * (1 + jitter)]` so a burst of failing
/// pipelines does not hammer the remote service in lockstep.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }
}

impl Default for ExponentialBackoff {
    /// Defaults tuned for HTTP calls: 3 retries, 500ms initial delay,
    /// 60s cap, doubling, 10% jitter.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);

        let jittered = if self.jitter > 0.0 {
            let offset = base * self.jitter * (rand::random::<f64>() - 0.5) * 2.0;
            base + offset
        } else {
            base
        };

        Some(Duration::from_secs_f64(
            jittered.min(self.max_delay.as_secs_f64()).max(0.0),
        ))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Builder for configuring [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoffBuilder {
    inner: ExponentialBackoff,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            inner: ExponentialBackoff::default(),
        }
    }
}

impl ExponentialBackoffBuilder {
    /// Set the maximum number of retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.inner.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.inner.initial_delay = delay;
        self
    }

    /// Set the cap on the delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.inner.max_delay = delay;
        self
    }

    /// Set the exponential multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.inner.multiplier = multiplier;
        self
    }

    /// Set the jitter factor (0.0 disables jitter).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.inner.jitter = jitter;
        self
    }

    /// Build the strategy.
    pub fn build(self) -> ExponentialBackoff {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum FakeError {
        Transient,
        Permanent,
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            matches!(self, FakeError::Transient)
        }
    }

    fn fast_backoff(max_retries: u32) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .jitter(0.0)
            .build()
    }

    #[test]
    fn delays_grow_exponentially_without_jitter() {
        let backoff = ExponentialBackoff::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .jitter(0.0)
            .build();

        assert_eq!(backoff.next_delay(0), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(2), Some(Duration::from_millis(400)));
    }

    #[test]
    fn delays_are_capped_at_max() {
        let backoff = ExponentialBackoff::builder()
            .initial_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(15))
            .jitter(0.0)
            .build();

        assert_eq!(backoff.next_delay(5), Some(Duration::from_secs(15)));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let backoff = ExponentialBackoff::builder()
            .initial_delay(Duration::from_millis(1000))
            .jitter(0.1)
            .build();

        for _ in 0..50 {
            let delay = backoff.next_delay(0).unwrap();
            assert!(delay >= Duration::from_millis(900), "{delay:?}");
            assert!(delay <= Duration::from_millis(1100), "{delay:?}");
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);

        let result = fast_backoff(3)
            .execute(|| {
                let seen = Arc::clone(&seen);
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FakeError::Transient)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_without_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);

        let result: Result<u32, FakeError> = fast_backoff(3)
            .execute(|| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Permanent)
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);

        let result: Result<u32, FakeError> = fast_backoff(2)
            .execute(|| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Transient)
                }
            })
            .await;

        assert!(result.is_err());
        // Initial attempt plus two retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
