//! Retry strategies and backoff implementations.
//!
//! Transient failures of the remote classifier and of the persistence
//! backends are retried through one shared abstraction:
//!
//! - [`BackoffStrategy`] - core trait for retry strategies
//! - [`Retryable`] - lets error types declare which variants are transient
//! - [`ExponentialBackoff`] - exponential backoff with jitter
//!
//! # Examples
//!
//! ```rust
//! use ordersieve_core::retry::{BackoffStrategy, ExponentialBackoff, Retryable};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Transient;
//!
//! impl Retryable for Transient {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), Transient> {
//! let backoff = ExponentialBackoff::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(250))
//!     .build();
//!
//! let result = backoff.execute(|| async {
//!     Ok::<_, Transient>("classified")
//! }).await?;
//! # Ok(())
//! # }
//! ```

mod exponential;
mod strategy;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use strategy::{BackoffStrategy, Retryable};
