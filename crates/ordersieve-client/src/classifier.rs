//! The remote classifier client.

use crate::error::{ClientError, Result};
use crate::prompts;
use crate::wire::{ChatMessage, ChatRequest, ChatResponse};
use ordersieve_core::budget::BudgetGovernor;
use ordersieve_core::cache::ResponseCache;
use ordersieve_core::retry::{BackoffStrategy, ExponentialBackoff};
use ordersieve_protocol::{
    Classification, MIN_ANALYZABLE_CHARS, Usage, extract_classification,
    extract_classification_batch, normalize,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Configuration for the remote classifier client.
#[derive(Clone)]
pub struct ClassifierConfig {
    /// Bearer token for the service.
    pub api_key: String,

    /// Model identifier sent in every request.
    pub model: String,

    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Output length cap per request.
    pub max_tokens: u32,

    /// Total attempts per request, counting the first try.
    pub max_retries: u32,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Maximum inputs per batched request.
    pub batch_size: usize,

    /// Response cache TTL.
    pub cache_ttl: Duration,

    /// Whether the response cache is used at all.
    pub cache_enabled: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.proxyapi.ru/openai/v1".to_string(),
            temperature: 0.6,
            max_tokens: 512,
            max_retries: 3,
            timeout: Duration::from_secs(30),
            batch_size: 10,
            cache_ttl: Duration::from_secs(3600),
            cache_enabled: true,
        }
    }
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("batch_size", &self.batch_size)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_enabled", &self.cache_enabled)
            .finish()
    }
}

/// A classification plus the usage figures of the call that produced it.
///
/// `usage` is `None` when the result came from the response cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// The validated classification.
    pub classification: Classification,

    /// Authoritative token usage, absent on cache hits.
    pub usage: Option<Usage>,
}

/// Client for the remote classification service.
///
/// Owns the response cache; shares the budget governor with the rest of
/// the pipeline because the governor is the single gate in front of every
/// paid call.
pub struct RemoteClassifier {
    http: reqwest::Client,
    config: ClassifierConfig,
    cache: Option<ResponseCache<Classification>>,
    budget: Arc<BudgetGovernor>,
    backoff: ExponentialBackoff,
}

impl RemoteClassifier {
    /// Build a client from configuration and the shared budget governor.
    pub fn new(config: ClassifierConfig, budget: Arc<BudgetGovernor>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let cache = config
            .cache_enabled
            .then(|| ResponseCache::new(config.cache_ttl));

        let backoff = ExponentialBackoff::builder()
            .max_retries(config.max_retries.saturating_sub(1))
            .initial_delay(Duration::from_millis(500))
            .build();

        Ok(Self {
            http,
            config,
            cache,
            budget,
            backoff,
        })
    }

    /// Classify a single text.
    ///
    /// Returns `Ok(None)` for texts too short to analyze. Budget denial
    /// and exhausted retries surface as errors so the pipeline can tell
    /// "not an order" from "could not ask".
    pub async fn classify(&self, text: &str) -> Result<Option<Verdict>> {
        let normalized = normalize(text);
        if normalized.chars().count() < MIN_ANALYZABLE_CHARS {
            return Ok(None);
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&normalized) {
                tracing::debug!("classification served from cache");
                return Ok(Some(Verdict {
                    classification: hit,
                    usage: None,
                }));
            }
        }

        let (classification, usage) = self
            .backoff
            .execute(|| self.classify_attempt(&normalized))
            .await?;

        if let Some(cache) = &self.cache {
            cache.set(normalized, classification.clone());
        }

        Ok(Some(Verdict {
            classification,
            usage,
        }))
    }

    /// Classify a batch of texts, preserving input order.
    ///
    /// Each slot is `None` when its text was too short, its chunk failed
    /// after retries, or the budget ran out mid-batch. Usage is recorded
    /// to the budget governor per chunk; batch callers read consumption
    /// from the governor's snapshot rather than per slot.
    pub async fn classify_batch(&self, texts: &[String]) -> Vec<Option<Classification>> {
        let mut results: Vec<Option<Classification>> = vec![None; texts.len()];

        let mut pending: Vec<(usize, String)> = Vec::new();
        for (i, raw) in texts.iter().enumerate() {
            let normalized = normalize(raw);
            if normalized.chars().count() < MIN_ANALYZABLE_CHARS {
                continue;
            }
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&normalized) {
                    results[i] = Some(hit);
                    continue;
                }
            }
            pending.push((i, normalized));
        }

        for chunk in pending.chunks(self.config.batch_size.max(1)) {
            let outcome = self
                .backoff
                .execute(|| self.batch_attempt(chunk))
                .await;

            match outcome {
                Ok(parsed) => {
                    for ((index, normalized), classification) in chunk.iter().zip(parsed) {
                        if let Some(classification) = classification {
                            if let Some(cache) = &self.cache {
                                cache.set(normalized.clone(), classification.clone());
                            }
                            results[*index] = Some(classification);
                        }
                    }
                }
                Err(ClientError::BudgetExhausted) => {
                    tracing::debug!("batch classification stopped, budget exhausted");
                    break;
                }
                Err(err) => {
                    tracing::warn!(%err, "batch chunk failed after retries");
                }
            }
        }

        results
    }

    /// One single-text attempt: budget gate, HTTP call, extraction.
    async fn classify_attempt(
        &self,
        normalized: &str,
    ) -> Result<(Classification, Option<Usage>)> {
        let (content, usage) = self.call_remote(normalized).await?;
        let classification = extract_classification(&content)?;
        tracing::debug!(
            is_order = classification.is_order,
            category = %classification.category,
            relevance = classification.relevance,
            "remote classification"
        );
        Ok((classification, usage))
    }

    /// One batch attempt for a chunk of (index, normalized text) pairs.
    async fn batch_attempt(
        &self,
        chunk: &[(usize, String)],
    ) -> Result<Vec<Option<Classification>>> {
        let prompt = prompts::batch_prompt(chunk.iter().map(|(_, t)| t.as_str()));
        let (content, _usage) = self.call_remote(&prompt).await?;
        Ok(extract_classification_batch(&content, chunk.len()))
    }

    /// Issue one HTTP request behind the budget gate.
    ///
    /// Usage is recorded to the governor as soon as the service reports
    /// it, whether or not the content later parses; failed parses still
    /// cost tokens.
    async fn call_remote(&self, user_content: &str) -> Result<(String, Option<Usage>)> {
        if !self.budget.reserve() {
            return Err(ClientError::BudgetExhausted);
        }

        let request_id = Uuid::new_v4();
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("X-Request-Id", request_id.to_string())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Payload(e.to_string()))?;

        let usage = parsed.usage;
        if let Some(usage) = &usage {
            self.budget
                .record(usage.prompt_tokens, usage.completion_tokens);
            tracing::debug!(
                %request_id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "remote call completed"
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ClientError::Payload("response carried no choices".to_string()))?;

        Ok((normalize(&content), usage))
    }

    /// Read-only view of the cache size, for diagnostics.
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map(ResponseCache::len).unwrap_or(0)
    }

    /// Sweep expired cache entries; returns how many were evicted.
    pub fn sweep_cache(&self) -> usize {
        self.cache.as_ref().map(ResponseCache::sweep).unwrap_or(0)
    }
}
