//! The storage seam the pipeline writes through.

use crate::error::StoreError;
use crate::write::{PersistOutcome, PipelineWrite};
use async_trait::async_trait;

/// Backend-agnostic persistence interface.
///
/// Implemented by the pooled Postgres primary, the tabular HTTP fallback,
/// the composition of the two, and an in-memory double for tests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist one pipeline run idempotently.
    ///
    /// On the primary path everything happens in a single transaction.
    /// Duplicate keys are success-no-ops reported through the outcome,
    /// never errors.
    async fn persist(&self, write: &PipelineWrite) -> Result<PersistOutcome, StoreError>;

    /// Whether the backend currently answers a cheap probe.
    async fn health_check(&self) -> bool;
}
