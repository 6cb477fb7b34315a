//! In-memory store double for tests and embedding.
//!
//! Enforces the same uniqueness keys and the same stat arithmetic as the
//! real backends, which is exactly what the idempotence tests need to
//! observe.

use crate::error::StoreError;
use crate::store::Store;
use crate::write::{PersistOutcome, PipelineWrite};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ordersieve_protocol::{DetectionMethod, OrderCategory};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A stored order, as the memory store keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    /// External message id, the unique key.
    pub message_id: String,
    /// External chat id.
    pub chat_id: String,
    /// Stored body text.
    pub text: String,
    /// Category.
    pub category: OrderCategory,
    /// Relevance in `[0, 1]`.
    pub relevance: f64,
    /// Detection method.
    pub detected_by: DetectionMethod,
    /// Permalink, when known.
    pub permalink: Option<String>,
    /// Insertion instant.
    pub created_at: DateTime<Utc>,
}

/// One day's counters, mirroring the `stats` row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatCounters {
    /// Messages seen.
    pub total_messages: i64,
    /// Orders detected.
    pub detected_orders: i64,
    /// Pattern-bank detections.
    pub regex_detections: i64,
    /// Remote-classifier detections.
    pub llm_detections: i64,
    /// Tokens consumed.
    pub llm_tokens_used: i64,
    /// Cost consumed, USD.
    pub llm_cost: f64,
}

#[derive(Debug, Default)]
struct State {
    chats: HashSet<String>,
    messages: HashSet<(String, String)>,
    orders: HashMap<String, StoredOrder>,
    stats: HashMap<String, StatCounters>,
    fail_next: bool,
}

/// In-memory [`Store`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `persist` call fail with a transient error, to
    /// exercise the pipeline's drop-and-redeliver path.
    pub fn fail_next_persist(&self) {
        self.state.lock().expect("state lock poisoned").fail_next = true;
    }

    /// All stored orders, insertion order not guaranteed.
    pub fn orders(&self) -> Vec<StoredOrder> {
        self.state
            .lock()
            .expect("state lock poisoned")
            .orders
            .values()
            .cloned()
            .collect()
    }

    /// The stored order for one message, when any.
    pub fn order_for(&self, message_id: &str) -> Option<StoredOrder> {
        self.state
            .lock()
            .expect("state lock poisoned")
            .orders
            .get(message_id)
            .cloned()
    }

    /// Number of stored message rows.
    pub fn message_count(&self) -> usize {
        self.state.lock().expect("state lock poisoned").messages.len()
    }

    /// Counters for one `YYYY-MM-DD` day.
    pub fn stats_for(&self, date: &str) -> StatCounters {
        self.state
            .lock()
            .expect("state lock poisoned")
            .stats
            .get(date)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn persist(&self, write: &PipelineWrite) -> Result<PersistOutcome, StoreError> {
        write.validate().map_err(StoreError::Validation)?;

        let mut state = self.state.lock().expect("state lock poisoned");
        if state.fail_next {
            state.fail_next = false;
            return Err(StoreError::Transport("injected failure".to_string()));
        }

        let chat_created = state.chats.insert(write.chat.external_id.clone());

        let message_key = (write.message.external_id.clone(), write.chat.external_id.clone());
        let message_created = state.messages.insert(message_key);

        let order_created = write.order.as_ref().map(|order| {
            if state.orders.contains_key(&write.message.external_id) {
                false
            } else {
                state.orders.insert(
                    write.message.external_id.clone(),
                    StoredOrder {
                        message_id: write.message.external_id.clone(),
                        chat_id: write.chat.external_id.clone(),
                        text: write.message.text.clone(),
                        category: order.category,
                        relevance: order.relevance,
                        detected_by: order.detected_by,
                        permalink: order.permalink.clone(),
                        created_at: Utc::now(),
                    },
                );
                true
            }
        });

        if message_created || order_created == Some(true) {
            let counters = state.stats.entry(write.stat_date()).or_default();
            counters.total_messages += i64::from(message_created);
            if order_created == Some(true) {
                counters.detected_orders += 1;
                match write.order.as_ref().map(|o| o.detected_by) {
                    Some(DetectionMethod::Regex) => counters.regex_detections += 1,
                    Some(DetectionMethod::Llm) => counters.llm_detections += 1,
                    _ => {}
                }
                if let Some(spend) = &write.llm_spend {
                    counters.llm_tokens_used += i64::from(spend.tokens);
                    counters.llm_cost += spend.cost_usd;
                }
            }
        }

        Ok(PersistOutcome {
            chat_created,
            message_created,
            order_created,
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::{ChatIdentity, NewMessage, NewOrder};

    fn write(message_id: &str, order: bool) -> PipelineWrite {
        PipelineWrite {
            chat: ChatIdentity {
                external_id: "-1".into(),
                name: "chat".into(),
                kind: "group",
            },
            message: NewMessage {
                external_id: message_id.into(),
                author_id: "1".into(),
                author_name: None,
                text: "Нужен Python разработчик".into(),
                timestamp: Utc::now(),
            },
            order: order.then(|| NewOrder {
                category: OrderCategory::Backend,
                relevance: 0.92,
                detected_by: DetectionMethod::Regex,
                permalink: None,
            }),
            llm_spend: None,
        }
    }

    #[tokio::test]
    async fn delivering_twice_equals_delivering_once() {
        let store = MemoryStore::new();
        let w = write("m1", true);

        let first = store.persist(&w).await.unwrap();
        assert!(first.chat_created);
        assert!(first.message_created);
        assert_eq!(first.order_created, Some(true));

        let second = store.persist(&w).await.unwrap();
        assert!(!second.chat_created);
        assert!(!second.message_created);
        assert_eq!(second.order_created, Some(false));

        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.message_count(), 1);
        let stats = store.stats_for(&w.stat_date());
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.detected_orders, 1);
        assert_eq!(stats.regex_detections, 1);
    }

    #[tokio::test]
    async fn duplicate_message_can_still_gain_an_order() {
        // First delivery stored the message but classification produced
        // nothing; a later run detects an order for the same message.
        let store = MemoryStore::new();
        store.persist(&write("m2", false)).await.unwrap();

        let outcome = store.persist(&write("m2", true)).await.unwrap();
        assert!(!outcome.message_created);
        assert_eq!(outcome.order_created, Some(true));

        let stats = store.stats_for(&write("m2", true).stat_date());
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.detected_orders, 1);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_once() {
        let store = MemoryStore::new();
        store.fail_next_persist();
        assert!(store.persist(&write("m3", false)).await.is_err());
        assert!(store.persist(&write("m3", false)).await.is_ok());
    }
}
