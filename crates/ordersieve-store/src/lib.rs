//! Persistence layer for ordersieve.
//!
//! Two surfaces of the same backend store: a pooled transactional
//! Postgres connection as the primary path and a PostgREST-style tabular
//! HTTP API as the fallback. Both enforce the same schema and the same
//! uniqueness keys, so a message redelivered after a failure deduplicates
//! instead of duplicating.
//!
//! The pipeline talks to the [`Store`] trait and hands it one
//! [`PipelineWrite`] per message; the Postgres implementation turns that
//! into a single transaction covering chat, message, optional order and
//! the additive daily-stat updates.

pub mod error;
pub mod fallback;
pub mod memory;
pub mod pg;
pub mod rest;
pub mod rows;
pub mod write;

mod store;

pub use error::StoreError;
pub use fallback::FallbackStore;
pub use memory::MemoryStore;
pub use pg::{PgStore, PgStoreConfig};
pub use rest::{RestStore, RestStoreConfig};
pub use store::Store;
pub use write::{ChatIdentity, LlmSpend, NewMessage, NewOrder, PersistOutcome, PipelineWrite, Upsert};

/// The embedded DDL applied by `admin init-db`.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");
