//! Token usage reported by the remote classifier

use serde::{Deserialize, Serialize};

/// Token usage for one remote-classifier call.
///
/// Field names match the `usage` object of the `/chat/completions`
/// response body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    /// Tokens in the prompt (system directive + user payload).
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion.
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total as reported by the service.
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Create a usage record; `total_tokens` is derived.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_derived() {
        let usage = Usage::new(120, 40);
        assert_eq!(usage.total_tokens, 160);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let usage: Usage = serde_json::from_str("{}").unwrap();
        assert_eq!(usage, Usage::default());
    }
}
