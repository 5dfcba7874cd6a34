//! Functional tests for the load runner

use magic_quill_client::backend::traits::PromptGuessRequest;
use magic_quill_client::config::{BackendConfig, LoadConfig};
use magic_quill_client::load::{LoadRunner, LoadTarget};
use magic_quill_client::HttpBackend;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{backend, png_uri, stalled_body_server};

#[tokio::test]
async fn test_load_all_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/magic_quill/guess_prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("a cat")))
        .expect(12)
        .mount(&server)
        .await;

    let config = LoadConfig {
        requests: 12,
        max_concurrent: 3,
        timeout_ms: 5000,
    };
    let stats = LoadRunner::new(Arc::new(backend(&server)), config)
        .run(LoadTarget::GuessPrompt(PromptGuessRequest::new(png_uri(16, 16))))
        .await
        .unwrap();

    assert_eq!(stats.target, "guess_prompt");
    assert_eq!(stats.total, 12);
    assert_eq!(stats.succeeded, 12);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.timed_out, 0);
    let latency = stats.latency.unwrap();
    assert!(latency.min_ms <= latency.p95_ms && latency.p95_ms <= latency.max_ms);
}

#[tokio::test]
async fn test_load_counts_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/magic_quill/process_background_img"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let config = LoadConfig {
        requests: 5,
        max_concurrent: 2,
        timeout_ms: 5000,
    };
    let stats = LoadRunner::new(Arc::new(backend(&server)), config)
        .run(LoadTarget::Background(png_uri(16, 16)))
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.failed, 5);
    assert!(stats.latency.is_none());
    assert_eq!(stats.success_rate(), 0.0);
}

#[tokio::test]
async fn test_load_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/magic_quill/guess_prompt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!("slow"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = LoadConfig {
        requests: 4,
        max_concurrent: 4,
        timeout_ms: 50,
    };
    let stats = LoadRunner::new(Arc::new(backend(&server)), config)
        .run(LoadTarget::GuessPrompt(PromptGuessRequest::new(png_uri(16, 16))))
        .await
        .unwrap();

    assert_eq!(stats.timed_out, 4);
    assert_eq!(stats.succeeded, 0);
}

#[tokio::test]
async fn test_load_counts_stalled_bodies_as_timeouts() {
    let backend_config = BackendConfig {
        base_url: stalled_body_server().await,
        timeout_ms: 200,
        ..Default::default()
    };
    let backend = HttpBackend::new(&backend_config).unwrap();

    let config = LoadConfig {
        requests: 3,
        max_concurrent: 3,
        timeout_ms: 5000,
    };
    let stats = LoadRunner::new(Arc::new(backend), config)
        .run(LoadTarget::GuessPrompt(PromptGuessRequest::new(png_uri(16, 16))))
        .await
        .unwrap();

    assert_eq!(stats.timed_out, 3);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_load_rejects_zero_concurrency() {
    let server = MockServer::start().await;
    let config = LoadConfig {
        requests: 1,
        max_concurrent: 0,
        timeout_ms: 1000,
    };
    let result = LoadRunner::new(Arc::new(backend(&server)), config)
        .run(LoadTarget::Background(png_uri(16, 16)))
        .await;
    assert!(result.is_err());
}
