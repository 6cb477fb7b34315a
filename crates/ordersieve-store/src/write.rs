//! The unit of persistence: everything one pipeline run writes.

use chrono::{DateTime, Utc};
use ordersieve_protocol::{DetectionMethod, OrderCategory};

/// Column width of `chat_name` and `author_name`.
pub const MAX_NAME_CHARS: usize = 255;

/// Column width of `telegram_link`.
pub const MAX_LINK_CHARS: usize = 500;

/// Result of an insert-or-get: either the row was created now or an
/// equivalent row already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert<T> {
    /// The insert created a new row.
    Created(T),
    /// A row with the same unique key already existed.
    Existing(T),
}

impl<T> Upsert<T> {
    /// Whether this outcome created a row.
    pub fn created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }

    /// The carried value, regardless of outcome.
    pub fn into_inner(self) -> T {
        match self {
            Upsert::Created(v) | Upsert::Existing(v) => v,
        }
    }
}

/// Identity of the chat a message belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatIdentity {
    /// Opaque external chat id.
    pub external_id: String,
    /// Display name, clamped to the column width on write.
    pub name: String,
    /// Storage form of the chat kind ("group", "channel", "private").
    pub kind: &'static str,
}

/// A message row to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    /// External message id; `(external_id, chat)` is the dedup key.
    pub external_id: String,
    /// Author external id, `"unknown"` when the network hides it.
    pub author_id: String,
    /// Author display name, clamped to the column width on write.
    pub author_name: Option<String>,
    /// Normalized, truncated body text.
    pub text: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

/// An order row to insert alongside the message.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// Category within the closed taxonomy.
    pub category: OrderCategory,
    /// Relevance in `[0, 1]`.
    pub relevance: f64,
    /// Which tier produced the order.
    pub detected_by: DetectionMethod,
    /// Permalink back to the source message, when one exists.
    pub permalink: Option<String>,
}

/// Tokens and derived cost of the paid call that produced an LLM order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LlmSpend {
    /// Total tokens of the call.
    pub tokens: u32,
    /// Derived cost of the call, USD.
    pub cost_usd: f64,
}

/// Everything one pipeline run persists, in one transaction on the
/// primary path.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineWrite {
    /// The chat, created on first contact.
    pub chat: ChatIdentity,
    /// The message row.
    pub message: NewMessage,
    /// The order, when either tier detected one.
    pub order: Option<NewOrder>,
    /// Paid-tier spend to add to the daily stats, present only when the
    /// order came from the remote classifier.
    pub llm_spend: Option<LlmSpend>,
}

impl PipelineWrite {
    /// The UTC calendar day this write's stats land on.
    pub fn stat_date(&self) -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Validate invariants that must hold before any backend sees the
    /// write. Dropping bad rows here keeps both paths consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.chat.external_id.trim().is_empty() {
            return Err("chat external id is empty".into());
        }
        if self.message.external_id.trim().is_empty() {
            return Err("message external id is empty".into());
        }
        if self.message.text.trim().is_empty() {
            return Err("message text is empty".into());
        }
        if let Some(order) = &self.order {
            if !(0.0..=1.0).contains(&order.relevance) {
                return Err(format!("order relevance {} outside [0, 1]", order.relevance));
            }
        }
        Ok(())
    }
}

/// What actually happened inside one persisted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Whether the chat row was created by this write.
    pub chat_created: bool,
    /// Whether the message row was created; `false` is a dedup hit.
    pub message_created: bool,
    /// Whether the order row was created; `None` when the write carried
    /// no order, `Some(false)` when an order already existed.
    pub order_created: Option<bool>,
}

/// Clamp a string to a column width without splitting a character.
pub(crate) fn clamp(value: &str, max_chars: usize) -> &str {
    ordersieve_protocol::truncate_chars(value, max_chars)
}
