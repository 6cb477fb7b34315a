//! The matcher itself: compile once, analyze forever.

use crate::bank::{EXCLUSION_PATTERNS, TRIGGER_BANK, TriggerPattern};
use ordersieve_protocol::{Detection, DetectionMethod, MIN_ANALYZABLE_CHARS, OrderCategory};
use regex::{Regex, RegexBuilder};

/// Minimum confidence a candidate must carry to be returned. Inclusive.
pub const ACCEPT_FLOOR: f64 = 0.80;

struct CompiledTrigger {
    category: OrderCategory,
    spec: &'static TriggerPattern,
    regex: Regex,
}

/// Deterministic first-tier order detector.
///
/// Holds nothing but compiled patterns; `analyze` is safe to call from
/// any number of tasks concurrently.
pub struct PatternMatcher {
    triggers: Vec<CompiledTrigger>,
    exclusions: Vec<Regex>,
}

impl PatternMatcher {
    /// Compile the full trigger bank and exclusion list.
    ///
    /// A pattern that fails to compile is skipped with an error log
    /// rather than taking the whole bank down; the bank is static and a
    /// test pins that every entry compiles.
    pub fn new() -> Self {
        let mut triggers = Vec::new();
        for group in TRIGGER_BANK {
            for spec in group.patterns {
                match compile(spec.pattern) {
                    Ok(regex) => triggers.push(CompiledTrigger {
                        category: group.category,
                        spec,
                        regex,
                    }),
                    Err(err) => {
                        tracing::error!(
                            pattern = spec.name,
                            category = %group.category,
                            %err,
                            "failed to compile trigger pattern"
                        );
                    }
                }
            }
        }

        let mut exclusions = Vec::new();
        for pattern in EXCLUSION_PATTERNS {
            match compile(pattern) {
                Ok(regex) => exclusions.push(regex),
                Err(err) => tracing::error!(pattern, %err, "failed to compile exclusion pattern"),
            }
        }

        tracing::info!(
            triggers = triggers.len(),
            exclusions = exclusions.len(),
            "pattern matcher initialized"
        );

        Self { triggers, exclusions }
    }

    /// Analyze a message body for an order.
    ///
    /// Returns the highest-confidence candidate when it clears
    /// [`ACCEPT_FLOOR`]; `None` for short texts, excluded texts, and
    /// texts nothing in the bank matches.
    pub fn analyze(&self, text: &str) -> Option<Detection> {
        if text.trim().chars().count() < MIN_ANALYZABLE_CHARS {
            return None;
        }

        for exclusion in &self.exclusions {
            if exclusion.is_match(text) {
                tracing::debug!("message vetoed by exclusion pattern");
                return None;
            }
        }

        let mut best: Option<Detection> = None;
        for trigger in &self.triggers {
            let Some(found) = trigger.regex.find(text) else {
                continue;
            };
            let better = best
                .as_ref()
                .is_none_or(|current| trigger.spec.confidence > current.confidence);
            if better {
                best = Some(Detection {
                    category: trigger.category,
                    confidence: trigger.spec.confidence,
                    method: DetectionMethod::Regex,
                    pattern: trigger.spec.name,
                    matched: found.as_str().to_string(),
                });
            }
        }

        let detection = best.filter(|d| d.confidence >= ACCEPT_FLOOR)?;
        tracing::info!(
            category = %detection.category,
            confidence = detection.confidence,
            pattern = detection.pattern,
            "order detected by pattern bank"
        );
        Some(detection)
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .unicode(true)
        .build()
}
