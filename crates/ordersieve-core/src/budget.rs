//! Daily spend governor for the paid classification tier.
//!
//! The governor is the only gate in front of the remote classifier:
//! every call site, batched or not, asks [`BudgetGovernor::reserve`]
//! first and records the authoritative usage figures afterwards. The
//! reserve/record pair is deliberately optimistic; the invariant is
//! eventual consistency within one in-flight call, not strict
//! pre-deduction.

use serde::Serialize;
use std::sync::Mutex;

/// Price per 1000 tokens, split by direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tariff {
    /// USD per 1000 prompt tokens.
    pub input_per_1k: f64,

    /// USD per 1000 completion tokens.
    pub output_per_1k: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            input_per_1k: 0.000_15,
            output_per_1k: 0.000_6,
        }
    }
}

impl Tariff {
    /// Cost in USD of one call's token usage.
    pub fn cost_of(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) / 1000.0) * self.input_per_1k
            + (f64::from(completion_tokens) / 1000.0) * self.output_per_1k
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    cost_usd: f64,
    denial_logged: bool,
}

/// Point-in-time view of the governor's counters.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BudgetSnapshot {
    /// Remote calls recorded today.
    pub requests: u64,

    /// Prompt tokens recorded today.
    pub prompt_tokens: u64,

    /// Completion tokens recorded today.
    pub completion_tokens: u64,

    /// Cost accumulated today, USD.
    pub cost_usd: f64,

    /// Configured daily ceiling, USD.
    pub ceiling_usd: f64,

    /// Budget left before the ceiling, never negative.
    pub remaining_usd: f64,
}

/// Tracks the remote classifier's daily token and cost consumption
/// against a configured ceiling.
#[derive(Debug)]
pub struct BudgetGovernor {
    ceiling_usd: f64,
    tariff: Tariff,
    counters: Mutex<Counters>,
}

impl BudgetGovernor {
    /// Create a governor with the given daily ceiling and tariff.
    pub fn new(ceiling_usd: f64, tariff: Tariff) -> Self {
        Self {
            ceiling_usd,
            tariff,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Whether another paid call may be issued right now.
    ///
    /// Does not deduct anything; the caller records usage after the
    /// service reports it. The first denial of the day is logged at
    /// warning level, later ones at debug.
    pub fn reserve(&self) -> bool {
        let mut counters = self.counters.lock().expect("budget lock poisoned");
        if counters.cost_usd < self.ceiling_usd {
            return true;
        }
        if !counters.denial_logged {
            counters.denial_logged = true;
            tracing::warn!(
                cost_usd = counters.cost_usd,
                ceiling_usd = self.ceiling_usd,
                "daily classifier budget exhausted, paid tier disabled until reset"
            );
        } else {
            tracing::debug!("classifier call denied, budget exhausted");
        }
        false
    }

    /// Record one call's authoritative usage figures.
    pub fn record(&self, prompt_tokens: u32, completion_tokens: u32) {
        let cost = self.tariff.cost_of(prompt_tokens, completion_tokens);
        let mut counters = self.counters.lock().expect("budget lock poisoned");
        counters.requests += 1;
        counters.prompt_tokens += u64::from(prompt_tokens);
        counters.completion_tokens += u64::from(completion_tokens);
        counters.cost_usd += cost;
    }

    /// Derive the cost of a usage report without recording it.
    pub fn cost_of(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        self.tariff.cost_of(prompt_tokens, completion_tokens)
    }

    /// Current counters plus remaining budget.
    pub fn snapshot(&self) -> BudgetSnapshot {
        let counters = self.counters.lock().expect("budget lock poisoned");
        BudgetSnapshot {
            requests: counters.requests,
            prompt_tokens: counters.prompt_tokens,
            completion_tokens: counters.completion_tokens,
            cost_usd: counters.cost_usd,
            ceiling_usd: self.ceiling_usd,
            remaining_usd: (self.ceiling_usd - counters.cost_usd).max(0.0),
        }
    }

    /// Zero all counters and re-arm the denial warning.
    ///
    /// Scheduled once per UTC day by the pipeline; safe to invoke
    /// manually.
    pub fn reset_day(&self) {
        let mut counters = self.counters.lock().expect("budget lock poisoned");
        *counters = Counters::default();
        tracing::info!("daily classifier budget counters reset");
    }
}
