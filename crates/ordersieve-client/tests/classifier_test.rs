//! Integration tests for the remote classifier client against a mock
//! `/chat/completions` endpoint.

use ordersieve_client::{ClassifierConfig, RemoteClassifier};
use ordersieve_core::budget::{BudgetGovernor, Tariff};
use ordersieve_protocol::OrderCategory;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn completion_body(content: &str, prompt_tokens: u32, completion_tokens: u32) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"content": content}}],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    })
}

fn config(base_url: &str) -> ClassifierConfig {
    ClassifierConfig {
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        max_retries: 3,
        timeout: Duration::from_secs(5),
        ..ClassifierConfig::default()
    }
}

fn governor() -> Arc<BudgetGovernor> {
    Arc::new(BudgetGovernor::new(10.0, Tariff::default()))
}

#[tokio::test]
async fn classifies_an_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("test-key"))
        .and(header_exists("X-Request-Id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"is_order": true, "category": "AI/ML", "relevance_score": 0.82, "reason": "wants ChatGPT integration"}"#,
            150,
            40,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let budget = governor();
    let client = RemoteClassifier::new(config(&server.uri()), Arc::clone(&budget)).unwrap();

    let verdict = client
        .classify("Нужна помощь с интеграцией ChatGPT в наш проект. Кто может помочь?")
        .await
        .unwrap()
        .expect("long text should be classified");

    assert!(verdict.classification.is_order);
    assert_eq!(verdict.classification.category, OrderCategory::AiMl);
    assert_eq!(verdict.classification.relevance, 0.82);
    let usage = verdict.usage.expect("live call reports usage");
    assert_eq!(usage.prompt_tokens, 150);

    let snapshot = budget.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.prompt_tokens, 150);
    assert_eq!(snapshot.completion_tokens, 40);
}

#[tokio::test]
async fn short_text_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = RemoteClassifier::new(config(&server.uri()), governor()).unwrap();
    assert!(client.classify("hi").await.unwrap().is_none());
    assert!(client.classify("  ").await.unwrap().is_none());
    assert_eq!(client.cache_len(), 0);
}

#[tokio::test]
async fn second_ask_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"is_order": true, "category": "Backend", "relevance_score": 0.9, "reason": "direct hire"}"#,
            100,
            30,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteClassifier::new(config(&server.uri()), governor()).unwrap();

    let first = client.classify("Ищем бэкенд разработчика на проект").await.unwrap().unwrap();
    // Same text with different whitespace normalizes to the same cache key.
    let second = client.classify("  Ищем   бэкенд разработчика на проект ").await.unwrap().unwrap();

    assert_eq!(first.classification, second.classification);
    assert!(second.usage.is_none(), "cache hits report no usage");
    assert_eq!(client.cache_len(), 1);
}

#[tokio::test]
async fn transient_5xx_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"is_order": false, "category": "Other", "relevance_score": 0.1, "reason": "chatter"}"#,
            80,
            20,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteClassifier::new(config(&server.uri()), governor()).unwrap();
    let verdict = client
        .classify("Привет всем, подскажите хорошую книгу про Rust пожалуйста")
        .await
        .unwrap()
        .unwrap();
    assert!(!verdict.classification.is_order);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteClassifier::new(config(&server.uri()), governor()).unwrap();
    let err = client
        .classify("Достаточно длинный текст для платной классификации")
        .await
        .unwrap_err();
    assert!(matches!(err, ordersieve_client::ClientError::Status { status: 401, .. }));
}

#[tokio::test]
async fn parse_failure_is_retried_and_only_success_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "sorry, I cannot help with that",
            50,
            10,
        )))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"is_order": true, "category": "Frontend", "relevance_score": 0.7, "reason": "site work"}"#,
            50,
            15,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let budget = governor();
    let client = RemoteClassifier::new(config(&server.uri()), Arc::clone(&budget)).unwrap();

    let verdict = client
        .classify("Нужно поправить вёрстку на сайте и добавить анимации")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verdict.classification.category, OrderCategory::Frontend);
    assert_eq!(client.cache_len(), 1);
    // Both calls cost tokens and both are recorded.
    assert_eq!(budget.snapshot().requests, 2);
}

#[tokio::test]
async fn budget_denial_stops_http_traffic() {
    // Nothing is mounted yet: any HTTP request would come back as a 404
    // status error, so a BudgetExhausted error proves the gate fired
    // before the network.
    let server = MockServer::start().await;

    let budget = Arc::new(BudgetGovernor::new(
        0.0001,
        Tariff { input_per_1k: 1.0, output_per_1k: 1.0 },
    ));
    budget.record(1000, 1000);
    let client = RemoteClassifier::new(config(&server.uri()), Arc::clone(&budget)).unwrap();

    let err = client
        .classify("Этот текст достаточно длинный, но бюджет уже исчерпан")
        .await
        .unwrap_err();
    assert!(matches!(err, ordersieve_client::ClientError::BudgetExhausted));

    // After the daily reset the same text goes through again.
    budget.reset_day();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"is_order": false, "category": "Other", "relevance_score": 0.0, "reason": "noise"}"#,
            10,
            5,
        )))
        .expect(1)
        .mount(&server)
        .await;
    assert!(client
        .classify("Этот текст достаточно длинный, но бюджет уже исчерпан")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn batch_returns_one_slot_per_input_in_order() {
    let server = MockServer::start().await;
    let batch_content = "\
{\"is_order\": true, \"category\": \"Backend\", \"relevance_score\": 0.9, \"reason\": \"hire\"}\n\
{\"is_order\": false, \"category\": \"\", \"relevance_score\": 0.1, \"reason\": \"chatter\"}";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(batch_content, 200, 60)))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteClassifier::new(config(&server.uri()), governor()).unwrap();
    let texts = vec![
        "Нужен Python разработчик на проект".to_string(),
        "Как дела у всех сегодня?".to_string(),
        "x".to_string(),
    ];
    let results = client.classify_batch(&texts).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().category, OrderCategory::Backend);
    assert_eq!(results[1].as_ref().unwrap().category, OrderCategory::Other);
    // Too short for any analysis: no slot, no network traffic for it.
    assert!(results[2].is_none());
}

#[tokio::test]
async fn oversized_batch_is_split_into_chunks() {
    let server = MockServer::start().await;

    let one_line = r#"{"is_order": false, "category": "Other", "relevance_score": 0.0, "reason": "no"}"#;
    let respond = move |request: &Request| {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let user = body["messages"][1]["content"].as_str().unwrap();
        let inputs = user.matches("Сообщение").count();
        let content = vec![one_line; inputs].join("\n");
        ResponseTemplate::new(200).set_body_json(completion_body(&content, 100, 30))
    };
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(respond)
        .expect(2)
        .mount(&server)
        .await;

    let mut cfg = config(&server.uri());
    cfg.batch_size = 2;
    let client = RemoteClassifier::new(cfg, governor()).unwrap();

    let texts: Vec<String> = (0..3)
        .map(|i| format!("Достаточно длинное сообщение номер {i} для батча"))
        .collect();
    let results = client.classify_batch(&texts).await;
    assert!(results.iter().all(Option::is_some));
}
