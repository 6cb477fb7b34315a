//! Error types for the persistence layer

use thiserror::Error;

/// Errors that can occur while persisting or querying.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The pooled SQL path failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The tabular HTTP path failed at the transport level.
    #[error("tabular api transport error: {0}")]
    Transport(String),

    /// The tabular HTTP path answered with an unexpected status.
    #[error("tabular api returned status {status} for {operation}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Which row operation was being attempted.
        operation: &'static str,
    },

    /// A value failed validation before it ever reached the backend.
    #[error("validation error: {0}")]
    Validation(String),

    /// No usable path: the pool never initialized and no fallback is
    /// configured.
    #[error("no persistence path available")]
    Unavailable,
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
