#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions for the ordersieve pipeline.
//!
//! This crate provides the utilities shared across the ordersieve crates
//! without pulling in any of the domain vocabulary:
//!
//! - **Retry strategies** via the `BackoffStrategy` trait and an
//!   exponential implementation with jitter
//! - **Response caching** via a TTL cache with lazy eviction and a
//!   periodic sweep hook
//! - **Spend control** via the daily budget governor that gates every
//!   paid remote-classifier call
//! - **Error accounting** via a rolling error monitor with an alert
//!   threshold
//!
//! # Examples
//!
//! ```rust
//! use ordersieve_core::prelude::*;
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
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let result = backoff.execute(|| async {
//!     Ok::<_, Transient>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod cache;
pub mod monitor;
pub mod retry;

/// Convenient re-exports of commonly used items.
pub mod prelude {
    pub use crate::budget::{BudgetGovernor, BudgetSnapshot, Tariff};
    pub use crate::cache::ResponseCache;
    pub use crate::monitor::ErrorMonitor;
    pub use crate::retry::{BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder, Retryable};
}
