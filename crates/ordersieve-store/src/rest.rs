//! The tabular HTTP fallback path.
//!
//! A PostgREST-style surface over the same backend: POST `/<table>` with
//! a JSON row, 201 means created, 409 means the unique key already holds
//! a row. Unlike the pooled path this one is not transactional across
//! rows; the chat is ensured first, then the message and order land
//! best-effort. The idempotent keys make the partial-failure window safe.

use crate::error::StoreError;
use crate::store::Store;
use crate::write::{
    MAX_LINK_CHARS, MAX_NAME_CHARS, PersistOutcome, PipelineWrite, clamp,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Connection settings for the tabular surface.
#[derive(Clone)]
pub struct RestStoreConfig {
    /// Base URL of the tabular API, e.g. `https://host/rest/v1`.
    pub base_url: String,

    /// Service key, sent as both `apikey` and bearer token.
    pub api_key: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for RestStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStoreConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Tabular HTTP store.
#[derive(Debug)]
pub struct RestStore {
    http: reqwest::Client,
    config: RestStoreConfig,
}

enum RowOutcome {
    Created,
    Conflict,
}

impl RestStore {
    /// Build the HTTP client for the tabular surface.
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    /// POST one row; 201 is created, 409 is an idempotent no-op.
    async fn insert_row(
        &self,
        table: &'static str,
        row: serde_json::Value,
    ) -> Result<RowOutcome, StoreError> {
        let response = self
            .authed(self.http.post(self.url(table)))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => Ok(RowOutcome::Created),
            409 => Ok(RowOutcome::Conflict),
            status => Err(StoreError::Rejected {
                status,
                operation: table,
            }),
        }
    }

    /// Make sure the chat row exists before its foreign-keyed rows.
    async fn ensure_chat(&self, write: &PipelineWrite) -> Result<bool, StoreError> {
        let response = self
            .authed(self.http.get(self.url("chats")))
            .query(&[
                ("chat_id", format!("eq.{}", write.chat.external_id)),
                ("select", "chat_id".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            let rows: Vec<serde_json::Value> = response.json().await.unwrap_or_default();
            if !rows.is_empty() {
                return Ok(false);
            }
        }

        let outcome = self
            .insert_row(
                "chats",
                json!({
                    "chat_id": write.chat.external_id,
                    "chat_name": clamp(&write.chat.name, MAX_NAME_CHARS),
                    "chat_type": write.chat.kind,
                    "is_active": true,
                }),
            )
            .await?;
        Ok(matches!(outcome, RowOutcome::Created))
    }

    /// Best-effort additive bump of today's stat row. A lost increment
    /// here is acceptable; the fallback path trades accuracy for
    /// availability.
    async fn bump_stats(&self, write: &PipelineWrite, order_created: bool) {
        let date = write.stat_date();
        let (tokens, cost) = match (&write.llm_spend, order_created) {
            (Some(spend), true) => (i64::from(spend.tokens), spend.cost_usd),
            _ => (0, 0.0),
        };
        let method = write.order.as_ref().map(|o| o.detected_by.as_str());

        let existing = self
            .authed(self.http.get(self.url("stats")))
            .query(&[("date", format!("eq.{date}")), ("limit", "1".to_string())])
            .send()
            .await;

        let row = match existing {
            Ok(response) if response.status().is_success() => {
                let rows: Vec<serde_json::Value> = response.json().await.unwrap_or_default();
                rows.into_iter().next()
            }
            _ => None,
        };

        let result = match row {
            Some(row) => {
                let get = |key: &str| row.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
                let patch = json!({
                    "total_messages": get("total_messages") + 1,
                    "detected_orders": get("detected_orders") + i64::from(order_created),
                    "regex_detections": get("regex_detections")
                        + i64::from(order_created && method == Some("regex")),
                    "llm_detections": get("llm_detections")
                        + i64::from(order_created && method == Some("llm")),
                    "llm_tokens_used": get("llm_tokens_used") + tokens,
                    "llm_cost": row.get("llm_cost").and_then(|v| v.as_f64()).unwrap_or(0.0) + cost,
                });
                self.authed(self.http.patch(self.url("stats")))
                    .query(&[("date", format!("eq.{date}"))])
                    .json(&patch)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(StoreError::from)
            }
            None => self
                .insert_row(
                    "stats",
                    json!({
                        "date": date,
                        "total_messages": 1,
                        "detected_orders": i64::from(order_created),
                        "regex_detections": i64::from(order_created && method == Some("regex")),
                        "llm_detections": i64::from(order_created && method == Some("llm")),
                        "llm_tokens_used": tokens,
                        "llm_cost": cost,
                    }),
                )
                .await
                .map(|_| ()),
        };

        if let Err(err) = result {
            tracing::debug!(%err, "stat bump over tabular api failed");
        }
    }
}

#[async_trait]
impl Store for RestStore {
    async fn persist(&self, write: &PipelineWrite) -> Result<PersistOutcome, StoreError> {
        write.validate().map_err(StoreError::Validation)?;

        let chat_created = self.ensure_chat(write).await?;

        let message_outcome = self
            .insert_row(
                "messages",
                json!({
                    "message_id": write.message.external_id,
                    "chat_id": write.chat.external_id,
                    "author_id": write.message.author_id,
                    "author_name": write.message.author_name.as_deref().map(|n| clamp(n, MAX_NAME_CHARS)),
                    "text": write.message.text,
                    "timestamp": write.message.timestamp.to_rfc3339(),
                    "processed": true,
                }),
            )
            .await?;
        let message_created = matches!(message_outcome, RowOutcome::Created);

        let order_created = match &write.order {
            Some(order) => {
                let outcome = self
                    .insert_row(
                        "userbot_orders",
                        json!({
                            "message_id": write.message.external_id,
                            "chat_id": write.chat.external_id,
                            "author_id": write.message.author_id,
                            "author_name": write.message.author_name.as_deref().map(|n| clamp(n, MAX_NAME_CHARS)),
                            "text": write.message.text,
                            "category": order.category.as_str(),
                            "relevance_score": order.relevance,
                            "detected_by": order.detected_by.as_str(),
                            "telegram_link": order.permalink.as_deref().map(|l| clamp(l, MAX_LINK_CHARS)),
                        }),
                    )
                    .await?;
                Some(matches!(outcome, RowOutcome::Created))
            }
            None => None,
        };

        if message_created || order_created == Some(true) {
            self.bump_stats(write, order_created == Some(true)).await;
        }

        tracing::info!(
            message_id = %write.message.external_id,
            message_created,
            "persisted via tabular api fallback"
        );

        Ok(PersistOutcome {
            chat_created,
            message_created,
            order_created,
        })
    }

    async fn health_check(&self) -> bool {
        let probe = self
            .authed(self.http.get(self.url("chats")))
            .query(&[("select", "chat_id"), ("limit", "1")])
            .send()
            .await;
        matches!(probe, Ok(response) if response.status().is_success())
    }
}
