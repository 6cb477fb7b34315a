//! Tier A detection results

use crate::category::{DetectionMethod, OrderCategory};
use serde::{Deserialize, Serialize};

/// A pattern-bank hit produced by the deterministic matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Category the matched pattern belongs to.
    pub category: OrderCategory,

    /// Confidence carried by the matched pattern, in `[0, 1]`.
    pub confidence: f64,

    /// Always [`DetectionMethod::Regex`] for matcher output.
    pub method: DetectionMethod,

    /// Name of the pattern that matched.
    pub pattern: &'static str,

    /// The substring of the message the pattern matched.
    pub matched: String,
}
