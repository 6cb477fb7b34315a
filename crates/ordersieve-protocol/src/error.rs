//! Error types for protocol-level operations

use std::fmt;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while interpreting wire or stored data
#[derive(Debug, Clone)]
pub enum ProtocolError {
    /// JSON serialization/deserialization error
    Serialization(String),

    /// A required field was missing from a payload
    MissingField(String),

    /// A field was present but failed validation
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// No classification object could be extracted from a payload
    Unparseable(String),

    /// Generic protocol error
    Other(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Self::MissingField(field) => write!(f, "Missing required field: {}", field),
            Self::InvalidField { field, reason } => {
                write!(f, "Invalid field {}: {}", field, reason)
            }
            Self::Unparseable(msg) => write!(f, "No classification found in payload: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
