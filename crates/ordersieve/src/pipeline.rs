//! The detection pipeline: one inbound message in, at most one order out.
//!
//! Per message the steps are strictly ordered: extract, allow-list,
//! normalize, tier A, maybe tier D, then one persistence transaction.
//! Across messages there is no ordering at all; the pipeline runs them
//! as independent tasks bounded by the remote-call semaphore and the
//! store's connection pool. The remote call always completes before the
//! persistence transaction opens so a slow classifier can never starve
//! the pool.

use crate::registry::ChatRegistry;
use crate::source::MessageSource;
use ordersieve_client::{ClientError, RemoteClassifier, Verdict};
use ordersieve_core::budget::BudgetGovernor;
use ordersieve_core::monitor::ErrorMonitor;
use ordersieve_matcher::PatternMatcher;
use ordersieve_protocol::{
    DetectionMethod, InboundMessage, MAX_STORED_TEXT_CHARS, REMOTE_MIN_CHARS, normalize, permalink,
    truncate_chars,
};
use ordersieve_store::{ChatIdentity, LlmSpend, NewMessage, NewOrder, PipelineWrite, Store};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Orchestrator knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Relevance floor for persisting a paid-tier order. Inclusive.
    pub relevance_threshold: f64,

    /// Soft cap on simultaneous remote-classifier calls. When the slots
    /// are saturated a message stays tier-A only instead of queueing.
    pub max_concurrent_remote: usize,

    /// How often the response cache is swept.
    pub cache_sweep_interval: Duration,

    /// How long shutdown waits for in-flight pipeline runs.
    pub shutdown_grace: Duration,

    /// Bypass the allow-list and process every chat.
    pub monitor_all: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.5,
            max_concurrent_remote: 4,
            cache_sweep_interval: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(35),
            monitor_all: false,
        }
    }
}

/// The per-message detection orchestrator.
///
/// All collaborators arrive through the constructor; the pipeline owns
/// its background tasks and cancels them on shutdown.
pub struct DetectionPipeline {
    matcher: PatternMatcher,
    classifier: Arc<RemoteClassifier>,
    store: Arc<dyn Store>,
    registry: Arc<ChatRegistry>,
    budget: Arc<BudgetGovernor>,
    monitor: Arc<ErrorMonitor>,
    config: PipelineConfig,
    remote_slots: Semaphore,
    shutdown_tx: watch::Sender<bool>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl DetectionPipeline {
    /// Wire the pipeline from its explicit dependencies.
    pub fn new(
        matcher: PatternMatcher,
        classifier: Arc<RemoteClassifier>,
        store: Arc<dyn Store>,
        registry: Arc<ChatRegistry>,
        budget: Arc<BudgetGovernor>,
        monitor: Arc<ErrorMonitor>,
        config: PipelineConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let remote_slots = Semaphore::new(config.max_concurrent_remote.max(1));
        Self {
            matcher,
            classifier,
            store,
            registry,
            budget,
            monitor,
            config,
            remote_slots,
            shutdown_tx,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the owned background tasks: the cache sweeper and the daily
    /// budget reset. Both exit promptly on shutdown.
    pub fn start(self: &Arc<Self>) {
        let mut background = self.background.lock().expect("background lock poisoned");

        let classifier = Arc::clone(&self.classifier);
        let interval = self.config.cache_sweep_interval;
        let mut shutdown = self.shutdown_tx.subscribe();
        background.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let evicted = classifier.sweep_cache();
                        if evicted > 0 {
                            tracing::debug!(evicted, "response cache swept");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));

        let budget = Arc::clone(&self.budget);
        let mut shutdown = self.shutdown_tx.subscribe();
        background.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(until_next_utc_midnight()) => budget.reset_day(),
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    /// Consume a source until it ends or shutdown is signalled, running
    /// each message as its own task.
    pub async fn run<S: MessageSource>(self: &Arc<Self>, mut source: S) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                next = source.next_message() => match next {
                    Some(message) => {
                        let pipeline = Arc::clone(self);
                        in_flight.spawn(async move { pipeline.handle_message(message).await });
                        // Reap whatever already finished; no await, no
                        // unbounded growth.
                        while in_flight.try_join_next().is_some() {}
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!("grace period elapsed, aborting in-flight pipeline runs");
            in_flight.abort_all();
        }
    }

    /// Signal shutdown and stop the background tasks.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = {
            let mut background = self.background.lock().expect("background lock poisoned");
            background.drain(..).collect()
        };
        for handle in handles {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                tracing::warn!("background task did not stop in time");
            }
        }
        tracing::info!("pipeline stopped");
    }

    /// Run one message through the pipeline. Never lets an error escape:
    /// every failure path logs and returns.
    pub async fn handle_message(&self, message: InboundMessage) {
        let Some(raw_body) = message.body() else {
            return;
        };

        if !self.config.monitor_all && !self.registry.is_monitored(&message.chat.id) {
            tracing::debug!(chat_id = %message.chat.id, "chat not monitored, dropped");
            return;
        }

        // Normalization happens exactly once. Tier A sees the full
        // normalized text; storage and tier D see it truncated.
        let normalized = normalize(raw_body);
        if normalized.is_empty() {
            return;
        }
        let stored_text = truncate_chars(&normalized, MAX_STORED_TEXT_CHARS).to_string();

        let link = permalink(message.chat.username.as_deref(), &message.chat.id, &message.id);

        let mut order: Option<NewOrder> = None;
        let mut llm_spend: Option<LlmSpend> = None;

        if let Some(detection) = self.matcher.analyze(&normalized) {
            order = Some(NewOrder {
                category: detection.category,
                relevance: detection.confidence,
                detected_by: DetectionMethod::Regex,
                permalink: link.clone(),
            });
        } else if normalized.chars().count() > REMOTE_MIN_CHARS && self.budget.reserve() {
            match self.remote_slots.try_acquire() {
                Ok(_permit) => match self.classifier.classify(&stored_text).await {
                    Ok(Some(verdict)) => {
                        if let Some((new_order, spend)) = self.accept_verdict(&verdict, &link) {
                            order = Some(new_order);
                            llm_spend = spend;
                        }
                    }
                    Ok(None) => {}
                    Err(ClientError::BudgetExhausted) => {
                        // The governor already logged the first denial of
                        // the day; the message stays tier-A only.
                    }
                    Err(err) => {
                        self.monitor.record("classify", "llm-client");
                        tracing::warn!(%err, "remote classification failed, keeping tier-A outcome");
                    }
                },
                Err(_) => {
                    tracing::debug!("remote slots saturated, message stays tier-A only");
                }
            }
        }

        let write = PipelineWrite {
            chat: ChatIdentity {
                external_id: message.chat.id.clone(),
                name: if message.chat.name.is_empty() {
                    format!("Chat {}", message.chat.id)
                } else {
                    message.chat.name.clone()
                },
                kind: message.chat.kind.as_storage_str(),
            },
            message: NewMessage {
                external_id: message.id.clone(),
                author_id: message.author_id().to_string(),
                author_name: message.author_name().map(str::to_string),
                text: stored_text,
                timestamp: message.timestamp,
            },
            order,
            llm_spend,
        };

        match self.store.persist(&write).await {
            Ok(outcome) => {
                tracing::debug!(
                    message_id = %write.message.external_id,
                    message_created = outcome.message_created,
                    order_created = ?outcome.order_created,
                    "pipeline run persisted"
                );
            }
            Err(err) => {
                // The store composition already ticked the error monitor.
                // Redelivery plus the unique keys make dropping safe here.
                tracing::error!(
                    message_id = %write.message.external_id,
                    %err,
                    "persistence failed, message dropped until redelivery"
                );
            }
        }
    }

    /// Apply the relevance floor to a paid-tier verdict.
    fn accept_verdict(
        &self,
        verdict: &Verdict,
        link: &Option<String>,
    ) -> Option<(NewOrder, Option<LlmSpend>)> {
        let classification = &verdict.classification;
        if !classification.is_order || classification.relevance < self.config.relevance_threshold {
            tracing::debug!(
                is_order = classification.is_order,
                relevance = classification.relevance,
                "paid tier verdict below threshold"
            );
            return None;
        }

        let spend = verdict.usage.map(|usage| LlmSpend {
            tokens: usage.total_tokens,
            cost_usd: self.budget.cost_of(usage.prompt_tokens, usage.completion_tokens),
        });

        Some((
            NewOrder {
                category: classification.category,
                relevance: classification.relevance,
                detected_by: DetectionMethod::Llm,
                permalink: link.clone(),
            },
            spend,
        ))
    }

    /// Budget snapshot passthrough for reporting.
    pub fn budget(&self) -> &BudgetGovernor {
        &self.budget
    }

    /// Error monitor passthrough for reporting.
    pub fn monitor(&self) -> &ErrorMonitor {
        &self.monitor
    }
}

/// Time left until the next UTC midnight, when the budget day rolls.
fn until_next_utc_midnight() -> Duration {
    let now = chrono::Utc::now();
    let next = (now + chrono::Duration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChatRegistry;
    use chrono::Utc;
    use ordersieve_client::ClassifierConfig;
    use ordersieve_core::budget::Tariff;
    use ordersieve_protocol::{Author, ChatKind, ChatRef, OrderCategory};
    use ordersieve_store::MemoryStore;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        pipeline: Arc<DetectionPipeline>,
        store: Arc<MemoryStore>,
        _dir: TempDir,
    }

    async fn fixture(classifier_url: &str, budget_usd: f64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ChatRegistry::load(dir.path().join("chats.json")).unwrap());
        registry.add("-100", "jobs", "supergroup", 1).unwrap();

        let budget = Arc::new(BudgetGovernor::new(budget_usd, Tariff::default()));
        let classifier = Arc::new(
            RemoteClassifier::new(
                ClassifierConfig {
                    api_key: "k".into(),
                    base_url: classifier_url.to_string(),
                    max_retries: 1,
                    timeout: Duration::from_secs(5),
                    ..ClassifierConfig::default()
                },
                Arc::clone(&budget),
            )
            .unwrap(),
        );
        let store = Arc::new(MemoryStore::new());

        let pipeline = Arc::new(DetectionPipeline::new(
            PatternMatcher::new(),
            classifier,
            Arc::clone(&store) as Arc<dyn Store>,
            registry,
            budget,
            Arc::new(ErrorMonitor::default()),
            PipelineConfig::default(),
        ));

        Fixture { pipeline, store, _dir: dir }
    }

    fn message(id: &str, chat_id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: id.into(),
            chat: ChatRef {
                id: chat_id.into(),
                name: "jobs".into(),
                kind: ChatKind::Supergroup,
                username: None,
            },
            author: Some(Author {
                id: "7".into(),
                name: Some("poster".into()),
                is_bot: false,
                is_self: false,
            }),
            text: Some(text.into()),
            caption: None,
            has_media: false,
            forwarded: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn regex_hit_is_persisted_without_a_remote_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server.uri(), 10.0).await;
        fx.pipeline
            .handle_message(message("1", "-100", "Нужен Python разработчик для проекта. Опыт от 3 лет."))
            .await;

        let order = fx.store.order_for("1").expect("order persisted");
        assert_eq!(order.category, OrderCategory::Backend);
        assert_eq!(order.detected_by, DetectionMethod::Regex);
        assert!(order.relevance >= 0.80);
        assert_eq!(fx.store.message_count(), 1);
    }

    #[tokio::test]
    async fn unmonitored_chat_is_dropped_entirely() {
        let server = MockServer::start().await;
        let fx = fixture(&server.uri(), 10.0).await;

        fx.pipeline
            .handle_message(message("1", "-999", "Нужен Python разработчик срочно"))
            .await;

        assert_eq!(fx.store.message_count(), 0);
        assert!(fx.store.orders().is_empty());
    }

    #[tokio::test]
    async fn short_message_is_stored_without_any_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server.uri(), 10.0).await;
        fx.pipeline.handle_message(message("1", "-100", "hi")).await;

        assert_eq!(fx.store.message_count(), 1);
        assert!(fx.store.orders().is_empty());
    }

    #[tokio::test]
    async fn exactly_twenty_chars_does_not_reach_the_paid_tier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server.uri(), 10.0).await;
        // 20 characters exactly after normalization; the guard is strict.
        let text = "в".repeat(20);
        assert_eq!(text.chars().count(), 20);
        fx.pipeline.handle_message(message("1", "-100", &text)).await;

        assert_eq!(fx.store.message_count(), 1);
        assert!(fx.store.orders().is_empty());
    }

    #[tokio::test]
    async fn llm_order_at_exact_threshold_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content":
                    "{\"is_order\": true, \"category\": \"AI/ML\", \"relevance_score\": 0.5, \"reason\": \"borderline\"}"}}],
                "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server.uri(), 10.0).await;
        fx.pipeline
            .handle_message(message("1", "-100", "Нужна помощь с интеграцией ChatGPT в наш проект."))
            .await;

        let order = fx.store.order_for("1").expect("threshold is inclusive");
        assert_eq!(order.detected_by, DetectionMethod::Llm);
        assert_eq!(order.relevance, 0.5);

        let stats = fx.store.stats_for(&Utc::now().format("%Y-%m-%d").to_string());
        assert_eq!(stats.llm_detections, 1);
        assert_eq!(stats.llm_tokens_used, 120);
        assert!(stats.llm_cost > 0.0);
    }

    #[tokio::test]
    async fn non_order_verdict_stores_message_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content":
                    "{\"is_order\": false, \"category\": \"\", \"relevance_score\": 0.1, \"reason\": \"greeting\"}"}}],
                "usage": {"prompt_tokens": 50, "completion_tokens": 15, "total_tokens": 65}
            })))
            .mount(&server)
            .await;

        let fx = fixture(&server.uri(), 10.0).await;
        fx.pipeline
            .handle_message(message("1", "-100", "Привет! Как дела? Давай встретимся на кофе."))
            .await;

        assert_eq!(fx.store.message_count(), 1);
        assert!(fx.store.orders().is_empty());
        let stats = fx.store.stats_for(&Utc::now().format("%Y-%m-%d").to_string());
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.detected_orders, 0);
    }

    #[tokio::test]
    async fn exhausted_budget_disables_the_paid_tier_but_not_tier_a() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server.uri(), 0.000_001).await;
        fx.pipeline.budget().record(1000, 1000);

        // Tier-D eligible message: dropped from the paid path.
        fx.pipeline
            .handle_message(message("1", "-100", "Подскажите пожалуйста кто делает интеграции со сторонними сервисами"))
            .await;
        assert!(fx.store.orders().is_empty());

        // Tier A still works.
        fx.pipeline
            .handle_message(message("2", "-100", "Нужен Python разработчик на проект"))
            .await;
        assert!(fx.store.order_for("2").is_some());
    }

    #[tokio::test]
    async fn persistence_failure_is_swallowed_and_redelivery_succeeds() {
        let server = MockServer::start().await;
        let fx = fixture(&server.uri(), 10.0).await;
        fx.store.fail_next_persist();

        let msg = message("1", "-100", "Нужен Python разработчик на проект");
        fx.pipeline.handle_message(msg.clone()).await;
        assert_eq!(fx.store.message_count(), 0);

        fx.pipeline.handle_message(msg).await;
        assert_eq!(fx.store.message_count(), 1);
        assert_eq!(fx.store.orders().len(), 1);
    }

    #[tokio::test]
    async fn run_drains_a_channel_source_and_shuts_down() {
        let server = MockServer::start().await;
        let fx = fixture(&server.uri(), 10.0).await;
        fx.pipeline.start();

        let (sender, source) = crate::source::ChannelSource::new(8);
        sender
            .send(message("1", "-100", "Нужен Python разработчик на проект"))
            .await
            .unwrap();
        drop(sender);

        fx.pipeline.run(source).await;
        fx.pipeline.shutdown().await;

        assert_eq!(fx.store.orders().len(), 1);
    }
}
