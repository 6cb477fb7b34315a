//! Remote classifier client for ordersieve
//!
//! The paid second tier of the detection pipeline. Submits normalized
//! message texts to an OpenAI-compatible `/chat/completions` endpoint,
//! parses a structured classification out of a possibly-noisy payload,
//! retries transient failures with backoff, and keeps itself behind the
//! response cache and the daily budget governor.
//!
//! # Discipline
//!
//! - The cache is consulted per input before any batching.
//! - The budget governor is consulted before every HTTP request; a denial
//!   is a non-retryable failure.
//! - Only successful classifications are written back to the cache, so a
//!   cache hit is always bit-identical to the first response stored for
//!   that normalized text.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod prompts;

mod classifier;
mod wire;

pub use classifier::{ClassifierConfig, RemoteClassifier, Verdict};
pub use error::{ClientError, Result};
