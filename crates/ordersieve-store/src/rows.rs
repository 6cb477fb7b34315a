//! Read-side row types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// One `userbot_orders` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderRow {
    /// Surrogate id.
    pub id: i64,
    /// External message id; unique across all orders.
    pub message_id: String,
    /// External chat id.
    pub chat_id: String,
    /// Author external id.
    pub author_id: String,
    /// Author display name.
    pub author_name: Option<String>,
    /// Stored body text.
    pub text: String,
    /// Category as stored.
    pub category: String,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f64,
    /// Detection method as stored.
    pub detected_by: String,
    /// Permalink back to the source, when known.
    pub telegram_link: Option<String>,
    /// When the order row was created.
    pub created_at: DateTime<Utc>,
    /// Whether the order was exported already.
    pub exported: bool,
    /// Operator feedback, when any.
    pub feedback: Option<String>,
    /// Free-form operator notes.
    pub notes: Option<String>,
}

/// One `stats` row: the counters of one UTC day.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatRow {
    /// Surrogate id.
    pub id: i64,
    /// Day in `YYYY-MM-DD`.
    pub date: String,
    /// Messages seen.
    pub total_messages: i64,
    /// Orders detected by either tier.
    pub detected_orders: i64,
    /// Orders detected by the pattern bank.
    pub regex_detections: i64,
    /// Orders detected by the remote classifier.
    pub llm_detections: i64,
    /// Tokens consumed by the remote classifier.
    pub llm_tokens_used: i64,
    /// Cost consumed by the remote classifier, USD.
    pub llm_cost: f64,
}

/// Orders grouped by a label, for summaries.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupCount {
    /// Group label (a category or a detection method).
    pub label: String,
    /// Rows in the group.
    pub count: i64,
}
