//! Shared domain types for the ordersieve detection pipeline
//!
//! This crate provides the type definitions used by every other ordersieve
//! crate: the order taxonomy, detection and classification results, the
//! inbound message shape, text normalization, and permalink construction.
//! By centralizing these types the matcher, the remote classifier client,
//! the store, and the pipeline all speak the same vocabulary.
//!
//! # Type Organization
//!
//! - **Taxonomy**: [`category`] - order categories, detection methods, chat kinds
//! - **Tier A results**: [`detection`] - pattern-matcher detections
//! - **Tier D results**: [`classify`] - remote-classifier output, lenient extraction
//! - **Inbound shape**: [`inbound`] - what the messaging network delivers
//! - **Text handling**: [`normalize`] - normalization and truncation
//! - **Permalinks**: [`link`] - links back to the source message
//! - **Usage accounting**: [`usage`] - token usage reported by the remote service
//!
//! # Design Principles
//!
//! - **Zero I/O**: all types are pure data structures
//! - **Serialization**: serde-based, matching the wire and column names of
//!   the deployed backend bit for bit
//! - **No circular dependencies**: this crate depends only on serde/chrono

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod category;
pub mod classify;
pub mod detection;
pub mod error;
pub mod inbound;
pub mod link;
pub mod normalize;
pub mod usage;

// Re-export commonly used types at crate level
pub use category::{ChatKind, DetectionMethod, OrderCategory};
pub use classify::{Classification, extract_classification, extract_classification_batch};
pub use detection::Detection;
pub use error::{ProtocolError, Result};
pub use inbound::{Author, ChatRef, InboundMessage};
pub use link::permalink;
pub use normalize::{
    MAX_STORED_TEXT_CHARS, MIN_ANALYZABLE_CHARS, REMOTE_MIN_CHARS, normalize, normalize_bytes,
    truncate_chars,
};
pub use usage::Usage;
