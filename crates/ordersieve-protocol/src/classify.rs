//! Tier D classification results and lenient payload extraction
//!
//! The remote classifier is asked for strict JSON but does not always
//! comply: payloads arrive wrapped in prose, fenced in markdown, or with
//! stray text between objects. Extraction therefore tries a full-payload
//! parse first and then scans for balanced `{...}` substrings, accepting
//! the first candidate that passes schema validation.

use crate::category::OrderCategory;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// A validated remote-classifier verdict for a single text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    /// Whether the text is a service-procurement order.
    pub is_order: bool,

    /// Category within the closed taxonomy.
    pub category: OrderCategory,

    /// Relevance in `[0, 1]`.
    #[serde(rename = "relevance_score", alias = "relevance")]
    pub relevance: f64,

    /// The classifier's stated reason, possibly empty.
    #[serde(default)]
    pub reason: String,
}

/// Untrusted shape of a classifier object before validation.
#[derive(Debug, Deserialize)]
struct RawClassification {
    is_order: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, rename = "relevance_score", alias = "relevance")]
    relevance: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

impl RawClassification {
    /// Validate field contents and normalize into a [`Classification`].
    fn validate(self) -> Result<Classification> {
        let relevance = self.relevance.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&relevance) || !relevance.is_finite() {
            return Err(ProtocolError::InvalidField {
                field: "relevance_score",
                reason: format!("{relevance} outside [0, 1]"),
            });
        }

        let raw_category = self.category.as_deref().unwrap_or("").trim();
        let category = match OrderCategory::parse(raw_category) {
            Some(c) => c,
            // A non-order with a blank or made-up category is normalized to
            // Other; an alleged order must name a real category.
            None if !self.is_order => OrderCategory::Other,
            None => {
                return Err(ProtocolError::InvalidField {
                    field: "category",
                    reason: format!("{raw_category:?} outside the closed set"),
                });
            }
        };

        Ok(Classification {
            is_order: self.is_order,
            category,
            relevance,
            reason: self.reason.unwrap_or_default(),
        })
    }
}

/// Extract a single validated [`Classification`] from a possibly-noisy
/// payload.
///
/// Strategy: parse the whole payload; failing that, try each balanced
/// `{...}` substring in order and accept the first that validates.
pub fn extract_classification(payload: &str) -> Result<Classification> {
    if let Ok(raw) = serde_json::from_str::<RawClassification>(payload) {
        return raw.validate();
    }

    for candidate in balanced_objects(payload) {
        if let Ok(raw) = serde_json::from_str::<RawClassification>(candidate) {
            if let Ok(valid) = raw.validate() {
                return Ok(valid);
            }
        }
    }

    Err(ProtocolError::Unparseable(snippet(payload)))
}

/// Extract one classification per input from a batch payload.
///
/// The remote is asked for one JSON object per input, in input order, one
/// per line. Blank lines and surrounding prose are tolerated; a payload
/// that is itself a JSON array of objects is accepted too. Slots that
/// cannot be filled are `None`; extra objects beyond `expected` are
/// ignored.
pub fn extract_classification_batch(payload: &str, expected: usize) -> Vec<Option<Classification>> {
    let mut results: Vec<Option<Classification>> = Vec::with_capacity(expected);

    // Some models return the whole batch as a JSON array instead of one
    // object per line.
    if let Ok(array) = serde_json::from_str::<Vec<serde_json::Value>>(payload.trim()) {
        for value in array.into_iter().take(expected) {
            let parsed = serde_json::from_value::<RawClassification>(value)
                .ok()
                .and_then(|raw| raw.validate().ok());
            results.push(parsed);
        }
    } else {
        for candidate in balanced_objects(payload) {
            if results.len() == expected {
                break;
            }
            let parsed = serde_json::from_str::<RawClassification>(candidate)
                .ok()
                .and_then(|raw| raw.validate().ok());
            // Unparseable objects still consume a slot: the remote was told
            // to answer in input order, so skipping would misalign the rest.
            results.push(parsed);
        }
    }

    results.resize_with(expected, || None);
    results
}

/// Iterate over balanced top-level `{...}` substrings of `payload`.
///
/// String literals and escape sequences are respected so braces inside
/// `reason` fields do not break the scan.
fn balanced_objects(payload: &str) -> Vec<&str> {
    let bytes = payload.as_bytes();
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        objects.push(&payload[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

fn snippet(payload: &str) -> String {
    const LIMIT: usize = 120;
    let trimmed = payload.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_clean_payload() {
        let payload = r#"{"is_order": true, "category": "Backend", "relevance_score": 0.9, "reason": "hiring"}"#;
        let c = extract_classification(payload).unwrap();
        assert!(c.is_order);
        assert_eq!(c.category, OrderCategory::Backend);
        assert_eq!(c.relevance, 0.9);
    }

    #[test]
    fn parses_payload_wrapped_in_prose() {
        let payload = "Sure! Here is the JSON you asked for:\n\n```json\n{\"is_order\": true, \"category\": \"AI/ML\", \"relevance_score\": 0.82, \"reason\": \"needs ChatGPT integration\"}\n```\nLet me know if you need anything else.";
        let c = extract_classification(payload).unwrap();
        assert_eq!(c.category, OrderCategory::AiMl);
        assert_eq!(c.relevance, 0.82);
    }

    #[test]
    fn accepts_relevance_alias() {
        let payload = r#"{"is_order": true, "category": "Mobile", "relevance": 0.75}"#;
        let c = extract_classification(payload).unwrap();
        assert_eq!(c.relevance, 0.75);
        assert_eq!(c.reason, "");
    }

    #[test]
    fn non_order_with_blank_category_becomes_other() {
        let payload = r#"{"is_order": false, "category": "", "relevance_score": 0.1, "reason": "greeting"}"#;
        let c = extract_classification(payload).unwrap();
        assert!(!c.is_order);
        assert_eq!(c.category, OrderCategory::Other);
    }

    #[test]
    fn order_with_unknown_category_is_rejected() {
        let payload = r#"{"is_order": true, "category": "Blockchain", "relevance_score": 0.9}"#;
        assert!(extract_classification(payload).is_err());
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.01)]
    #[case(f64::NAN)]
    fn out_of_range_relevance_is_rejected(#[case] relevance: f64) {
        let payload = format!(
            r#"{{"is_order": false, "category": "Other", "relevance_score": {relevance}}}"#
        );
        assert!(extract_classification(&payload).is_err());
    }

    #[test]
    fn garbage_payload_is_unparseable() {
        let err = extract_classification("the model is overloaded, try later").unwrap_err();
        assert!(matches!(err, ProtocolError::Unparseable(_)));
    }

    #[test]
    fn braces_inside_reason_do_not_break_the_scan() {
        let payload = r#"noise {"is_order": false, "category": "Other", "relevance_score": 0.0, "reason": "contains {braces} and \"quotes\""} noise"#;
        let c = extract_classification(payload).unwrap();
        assert!(c.reason.contains("{braces}"));
    }

    #[test]
    fn batch_parses_one_object_per_line() {
        let payload = "\n{\"is_order\": true, \"category\": \"Backend\", \"relevance_score\": 0.9}\n\n{\"is_order\": false, \"category\": \"\", \"relevance_score\": 0.2}\n";
        let results = extract_classification_batch(payload, 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].as_ref().unwrap().is_order);
        assert_eq!(results[1].as_ref().unwrap().category, OrderCategory::Other);
    }

    #[test]
    fn batch_pads_short_responses_with_none() {
        let payload = r#"{"is_order": false, "category": "Other", "relevance_score": 0.0}"#;
        let results = extract_classification_batch(payload, 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }

    #[test]
    fn batch_ignores_extra_objects() {
        let payload = "{\"is_order\": false, \"category\": \"Other\", \"relevance_score\": 0.0}\n{\"is_order\": true, \"category\": \"Backend\", \"relevance_score\": 0.9}";
        let results = extract_classification_batch(payload, 1);
        assert_eq!(results.len(), 1);
        assert!(!results[0].as_ref().unwrap().is_order);
    }

    #[test]
    fn batch_accepts_json_array_form() {
        let payload = r#"[{"is_order": true, "category": "Frontend", "relevance_score": 0.7}, {"is_order": false, "category": "Other", "relevance_score": 0.0}]"#;
        let results = extract_classification_batch(payload, 2);
        assert_eq!(results[0].as_ref().unwrap().category, OrderCategory::Frontend);
        assert!(results[1].is_some());
    }

    #[test]
    fn batch_invalid_object_consumes_its_slot() {
        let payload = "{\"is_order\": true, \"category\": \"Nonsense\", \"relevance_score\": 0.9}\n{\"is_order\": true, \"category\": \"Backend\", \"relevance_score\": 0.9}";
        let results = extract_classification_batch(payload, 2);
        assert!(results[0].is_none());
        assert_eq!(results[1].as_ref().unwrap().category, OrderCategory::Backend);
    }

    #[test]
    fn reserialized_classification_parses_to_equal_value() {
        let payload = r#"{"is_order": true, "category": "Low-Code", "relevance_score": 0.66, "reason": "zapier work"}"#;
        let first = extract_classification(payload).unwrap();
        let json = serde_json::to_string(&first).unwrap();
        let second = extract_classification(&json).unwrap();
        assert_eq!(first, second);
    }
}
