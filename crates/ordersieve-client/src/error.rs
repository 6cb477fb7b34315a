//! Error types for remote classification

use ordersieve_core::retry::Retryable;
use ordersieve_protocol::ProtocolError;
use thiserror::Error;

/// Result type alias for classifier operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the remote classifier.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The budget governor denied the call. Never retried; the paid tier
    /// stays closed until the daily reset.
    #[error("daily classifier budget exhausted")]
    BudgetExhausted,

    /// Could not reach the service.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request ran past its deadline.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("remote classifier returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body for logs.
        body: String,
    },

    /// The response body was not the expected completion envelope.
    #[error("unusable response payload: {0}")]
    Payload(String),

    /// The completion content did not yield a valid classification.
    #[error("classification parse failure: {0}")]
    Parse(#[from] ProtocolError),
}

impl Retryable for ClientError {
    /// Network trouble, 5xx, 429 and parse failures may heal on retry;
    /// other 4xx and budget denials never do.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Payload(_) | Self::Parse(_) => true,
            Self::BudgetExhausted => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_partition_matches_the_contract() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Connection("refused".into()).is_retryable());
        assert!(ClientError::Status { status: 500, body: String::new() }.is_retryable());
        assert!(ClientError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(ClientError::Payload("no choices".into()).is_retryable());

        assert!(!ClientError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!ClientError::Status { status: 401, body: String::new() }.is_retryable());
        assert!(!ClientError::BudgetExhausted.is_retryable());
    }
}
