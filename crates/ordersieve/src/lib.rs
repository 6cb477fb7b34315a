//! Two-tier order detection over a chat-message stream.
//!
//! ordersieve watches monitored chats, classifies every message as a
//! service-procurement order or noise, and persists the result. The
//! cheap deterministic tier (a curated pattern bank) answers first; only
//! ambiguous messages long enough to matter reach the paid remote
//! classifier, and that tier sits behind a response cache, a daily
//! budget governor, and a concurrency cap.
//!
//! This crate is the facade: configuration, the chat registry, the
//! detection pipeline orchestrator, reporting, and the CLI binary. The
//! building blocks live in the sibling crates:
//!
//! - `ordersieve-protocol`: shared domain types and normalization
//! - `ordersieve-core`: retry, cache, budget governor, error monitor
//! - `ordersieve-matcher`: the deterministic first tier
//! - `ordersieve-client`: the remote classifier client
//! - `ordersieve-store`: Postgres primary, tabular HTTP fallback

pub mod config;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod source;

pub use config::{ConfigError, Settings};
pub use pipeline::{DetectionPipeline, PipelineConfig};
pub use registry::{ChatEntry, ChatRegistry};
pub use report::{Period, PeriodSummary};
pub use source::{ChannelSource, MessageSource, StdinSource};

/// Default location of the chat registry file.
pub const DEFAULT_REGISTRY_PATH: &str = "config/chats.json";
