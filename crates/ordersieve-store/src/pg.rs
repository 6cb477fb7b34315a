//! The pooled Postgres primary path.
//!
//! One [`PipelineWrite`] becomes one transaction: insert-or-get chat,
//! insert message, optional insert order, additive stat upserts, chat
//! touch. Duplicate keys are absorbed by `ON CONFLICT DO NOTHING` and
//! reported through the outcome instead of surfacing as errors, which is
//! what makes redelivery safe.

use crate::error::StoreError;
use crate::rows::{GroupCount, OrderRow, StatRow};
use crate::store::Store;
use crate::write::{
    MAX_LINK_CHARS, MAX_NAME_CHARS, PersistOutcome, PipelineWrite, Upsert, clamp,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;

/// Connection settings for the primary path.
#[derive(Clone)]
pub struct PgStoreConfig {
    /// Postgres connection URL.
    pub url: String,

    /// Pool size cap. The deployed default is 20 steady connections plus
    /// 10 of overflow, expressed here as one ceiling.
    pub max_connections: u32,

    /// How long an acquire may block before failing.
    pub acquire_timeout: Duration,
}

impl Default for PgStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 30,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for PgStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL embeds credentials; never print it.
        f.debug_struct("PgStoreConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Pooled transactional store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect the pool.
    pub async fn connect(config: &PgStoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;
        tracing::info!(max_connections = config.max_connections, "database pool initialized");
        Ok(Self { pool })
    }

    /// Apply the embedded schema. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for statement in crate::SCHEMA_SQL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::info!("database schema applied");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }

    /// Insert-or-get the chat row by external id.
    async fn ensure_chat(
        tx: &mut Transaction<'_, Postgres>,
        write: &PipelineWrite,
    ) -> Result<Upsert<i64>, StoreError> {
        let name = clamp(&write.chat.name, MAX_NAME_CHARS);
        let inserted: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO chats (chat_id, chat_name, chat_type, is_active) \
             VALUES ($1, $2, $3, TRUE) \
             ON CONFLICT (chat_id) DO NOTHING \
             RETURNING id",
        )
        .bind(&write.chat.external_id)
        .bind(name)
        .bind(write.chat.kind)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some((id,)) = inserted {
            tracing::info!(chat_id = %write.chat.external_id, "chat created");
            return Ok(Upsert::Created(id));
        }

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM chats WHERE chat_id = $1")
            .bind(&write.chat.external_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(Upsert::Existing(id))
    }

    /// Insert the message row; `false` is a dedup hit.
    async fn insert_message(
        tx: &mut Transaction<'_, Postgres>,
        write: &PipelineWrite,
    ) -> Result<bool, StoreError> {
        let author_name = write
            .message
            .author_name
            .as_deref()
            .map(|n| clamp(n, MAX_NAME_CHARS));
        let inserted: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO messages (message_id, chat_id, author_id, author_name, text, timestamp, processed) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE) \
             ON CONFLICT (message_id, chat_id) DO NOTHING \
             RETURNING id",
        )
        .bind(&write.message.external_id)
        .bind(&write.chat.external_id)
        .bind(&write.message.author_id)
        .bind(author_name)
        .bind(&write.message.text)
        .bind(write.message.timestamp)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(inserted.is_some())
    }

    /// Insert-or-get the order row by external message id.
    async fn insert_order(
        tx: &mut Transaction<'_, Postgres>,
        write: &PipelineWrite,
    ) -> Result<Upsert<i64>, StoreError> {
        let order = write.order.as_ref().expect("caller checked order presence");
        let author_name = write
            .message
            .author_name
            .as_deref()
            .map(|n| clamp(n, MAX_NAME_CHARS));
        let link = order.permalink.as_deref().map(|l| clamp(l, MAX_LINK_CHARS));

        let inserted: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO userbot_orders \
             (message_id, chat_id, author_id, author_name, text, category, relevance_score, detected_by, telegram_link) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (message_id) DO NOTHING \
             RETURNING id",
        )
        .bind(&write.message.external_id)
        .bind(&write.chat.external_id)
        .bind(&write.message.author_id)
        .bind(author_name)
        .bind(&write.message.text)
        .bind(order.category.as_str())
        .bind(order.relevance)
        .bind(order.detected_by.as_str())
        .bind(link)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some((id,)) = inserted {
            tracing::info!(
                category = %order.category,
                detected_by = %order.detected_by,
                "order created"
            );
            return Ok(Upsert::Created(id));
        }

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM userbot_orders WHERE message_id = $1")
            .bind(&write.message.external_id)
            .fetch_one(&mut **tx)
            .await?;
        tracing::debug!(message_id = %write.message.external_id, "order already stored");
        Ok(Upsert::Existing(id))
    }

    /// Additive upsert of the daily counters.
    #[allow(clippy::too_many_arguments)]
    async fn bump_stats(
        tx: &mut Transaction<'_, Postgres>,
        date: &str,
        messages: i64,
        orders: i64,
        regex: i64,
        llm: i64,
        tokens: i64,
        cost: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO stats (date, total_messages, detected_orders, regex_detections, llm_detections, llm_tokens_used, llm_cost) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (date) DO UPDATE SET \
                 total_messages   = stats.total_messages   + EXCLUDED.total_messages, \
                 detected_orders  = stats.detected_orders  + EXCLUDED.detected_orders, \
                 regex_detections = stats.regex_detections + EXCLUDED.regex_detections, \
                 llm_detections   = stats.llm_detections   + EXCLUDED.llm_detections, \
                 llm_tokens_used  = stats.llm_tokens_used  + EXCLUDED.llm_tokens_used, \
                 llm_cost         = stats.llm_cost         + EXCLUDED.llm_cost, \
                 updated_at       = now()",
        )
        .bind(date)
        .bind(messages)
        .bind(orders)
        .bind(regex)
        .bind(llm)
        .bind(tokens)
        .bind(cost)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Additive upsert of the per-chat daily counters.
    async fn bump_chat_stats(
        tx: &mut Transaction<'_, Postgres>,
        chat_id: &str,
        date: &str,
        messages: i64,
        orders: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_stats (chat_id, date, messages_count, orders_count, order_percentage) \
             VALUES ($1, $2, $3, $4, CASE WHEN $3 > 0 THEN $4::float8 * 100.0 / $3 ELSE 0 END) \
             ON CONFLICT (chat_id, date) DO UPDATE SET \
                 messages_count = chat_stats.messages_count + EXCLUDED.messages_count, \
                 orders_count   = chat_stats.orders_count   + EXCLUDED.orders_count, \
                 order_percentage = CASE \
                     WHEN chat_stats.messages_count + EXCLUDED.messages_count > 0 \
                     THEN (chat_stats.orders_count + EXCLUDED.orders_count)::float8 * 100.0 \
                          / (chat_stats.messages_count + EXCLUDED.messages_count) \
                     ELSE 0 END",
        )
        .bind(chat_id)
        .bind(date)
        .bind(messages)
        .bind(orders)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Orders in a window, optionally restricted to one category.
    pub async fn orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        category: Option<&str>,
    ) -> Result<Vec<OrderRow>, StoreError> {
        let rows = match category {
            Some(category) => {
                sqlx::query_as::<_, OrderRow>(
                    "SELECT * FROM userbot_orders \
                     WHERE created_at >= $1 AND created_at < $2 AND category = $3 \
                     ORDER BY created_at",
                )
                .bind(from)
                .bind(to)
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(
                    "SELECT * FROM userbot_orders \
                     WHERE created_at >= $1 AND created_at < $2 \
                     ORDER BY created_at",
                )
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Orders not yet exported, oldest first.
    pub async fn unexported_orders(&self, limit: i64) -> Result<Vec<OrderRow>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM userbot_orders WHERE exported = FALSE ORDER BY created_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Flag an order as exported.
    pub async fn mark_exported(&self, order_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE userbot_orders SET exported = TRUE WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Attach operator feedback to an order.
    pub async fn add_feedback(
        &self,
        order_id: i64,
        feedback_type: &str,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO feedback (order_id, feedback_type, reason) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(feedback_type)
            .bind(reason.map(|r| clamp(r, MAX_LINK_CHARS)))
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE userbot_orders SET feedback = $2 WHERE id = $1")
            .bind(order_id)
            .bind(feedback_type)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Daily stat rows in a date window (inclusive bounds, `YYYY-MM-DD`).
    pub async fn stats_between(&self, from: &str, to: &str) -> Result<Vec<StatRow>, StoreError> {
        let rows = sqlx::query_as::<_, StatRow>(
            "SELECT id, date, total_messages, detected_orders, regex_detections, \
                    llm_detections, llm_tokens_used, llm_cost \
             FROM stats WHERE date >= $1 AND date <= $2 ORDER BY date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Order counts grouped by category over the last `days` days.
    pub async fn orders_by_category(&self, days: i64) -> Result<Vec<GroupCount>, StoreError> {
        let since = Utc::now() - ChronoDuration::days(days);
        let rows = sqlx::query_as::<_, GroupCount>(
            "SELECT category AS label, COUNT(*) AS count FROM userbot_orders \
             WHERE created_at >= $1 GROUP BY category ORDER BY count DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Order counts grouped by detection method over the last `days` days.
    pub async fn orders_by_method(&self, days: i64) -> Result<Vec<GroupCount>, StoreError> {
        let since = Utc::now() - ChronoDuration::days(days);
        let rows = sqlx::query_as::<_, GroupCount>(
            "SELECT detected_by AS label, COUNT(*) AS count FROM userbot_orders \
             WHERE created_at >= $1 GROUP BY detected_by",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn persist(&self, write: &PipelineWrite) -> Result<PersistOutcome, StoreError> {
        write.validate().map_err(StoreError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let chat = Self::ensure_chat(&mut tx, write).await?;
        let message_created = Self::insert_message(&mut tx, write).await?;

        let order = match &write.order {
            Some(_) => Some(Self::insert_order(&mut tx, write).await?),
            None => None,
        };
        let order_created = order.as_ref().map(Upsert::created);

        // Stat deltas reflect what this transaction actually created, so
        // a redelivered message cannot double-count.
        let date = write.stat_date();
        let messages_delta = i64::from(message_created);
        let order_delta = i64::from(order_created == Some(true));
        if message_created || order_created == Some(true) {
            let order_ref = write.order.as_ref();
            let regex_delta = i64::from(
                order_created == Some(true)
                    && order_ref.is_some_and(|o| o.detected_by.as_str() == "regex"),
            );
            let llm_delta = i64::from(
                order_created == Some(true)
                    && order_ref.is_some_and(|o| o.detected_by.as_str() == "llm"),
            );
            let (tokens, cost) = match (&write.llm_spend, order_created) {
                (Some(spend), Some(true)) => (i64::from(spend.tokens), spend.cost_usd),
                _ => (0, 0.0),
            };
            Self::bump_stats(
                &mut tx,
                &date,
                messages_delta,
                order_delta,
                regex_delta,
                llm_delta,
                tokens,
                cost,
            )
            .await?;
            Self::bump_chat_stats(&mut tx, &write.chat.external_id, &date, messages_delta, order_delta)
                .await?;
        }

        sqlx::query("UPDATE chats SET last_message_at = $2 WHERE chat_id = $1")
            .bind(&write.chat.external_id)
            .bind(write.message.timestamp)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PersistOutcome {
            chat_created: chat.created(),
            message_created,
            order_created,
        })
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
