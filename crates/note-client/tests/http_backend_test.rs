//! HTTP client tests against a local mock backend

mod fixtures;

use fixtures::{unused_base_url, MockBackend, MockReply};
use medprompt_core::{ClinicalPrompt, PromptBuilder, ScanAttributes};
use medprompt_note_client::{BackendConfig, Dialect, HttpNoteClient, NoteBackendClient, NoteFailure, NoteResult};
use serde_json::json;
use std::time::Duration;

fn prompt() -> ClinicalPrompt {
    let attributes = ScanAttributes::new(Some("ANON"), Some("CT"), Some("20240115"));
    PromptBuilder::new().build(&attributes, Some("abnormal region covers 3.1% of the image"))
}

fn client(base_url: String, dialect: Dialect) -> HttpNoteClient {
    HttpNoteClient::new(BackendConfig {
        base_url,
        dialect,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_completion_success() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(
        200,
        json!({"choices": [{"text": "\nImpression: small hypodensity.\n"}]}),
    ))
    .await?;

    let result = client(server.base_url(), Dialect::Completion)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    assert_eq!(result, NoteResult::Success("Impression: small hypodensity.".to_string()));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/completions");
    assert_eq!(requests[0].body["model"], "openai/gpt-oss-20b");
    assert_eq!(requests[0].body["max_tokens"], 512);
    assert!(requests[0].body["prompt"].as_str().unwrap().contains("Modality: CT"));
    assert!(requests[0].authorization.is_none());

    server.shutdown().await
}

#[tokio::test]
async fn test_chat_success() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(
        200,
        json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "Normal study."}}]}),
    ))
    .await?;

    let result = client(server.base_url(), Dialect::Chat)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    assert_eq!(result.text(), Some("Normal study."));

    let requests = server.requests();
    assert_eq!(requests[0].path, "/v1/chat/completions");
    let messages = requests[0].body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert!(messages[1]["content"].as_str().unwrap().contains("Detected Abnormalities"));

    server.shutdown().await
}

#[tokio::test]
async fn test_empty_choices() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(200, json!({"choices": []}))).await?;

    let result = client(server.base_url(), Dialect::Completion)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    assert!(matches!(
        result,
        NoteResult::Failure(NoteFailure::EmptyResponse { .. })
    ));

    server.shutdown().await
}

#[tokio::test]
async fn test_non_json_body() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::raw(200, "not json")).await?;

    let result = client(server.base_url(), Dialect::Chat)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    assert!(matches!(
        result.failure(),
        Some(NoteFailure::EmptyResponse { .. })
    ));

    server.shutdown().await
}

#[tokio::test]
async fn test_server_error_is_retryable() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(503, json!({"error": "model loading"}))).await?;

    let result = client(server.base_url(), Dialect::Completion)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    let failure = result.failure().unwrap();
    assert!(matches!(failure, NoteFailure::BackendUnavailable { .. }));
    assert!(failure.is_retryable());

    server.shutdown().await
}

#[tokio::test]
async fn test_rate_limited_is_retryable() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(429, json!({"error": "slow down"}))).await?;

    let result = client(server.base_url(), Dialect::Completion)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    assert!(result.failure().unwrap().is_retryable());

    server.shutdown().await
}

#[tokio::test]
async fn test_bad_request_is_rejected() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(400, json!({"error": "unknown model"}))).await?;

    let result = client(server.base_url(), Dialect::Completion)
        .generate(&prompt(), Duration::from_secs(5))
        .await;
    match result {
        NoteResult::Failure(NoteFailure::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("unknown model"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }

    server.shutdown().await
}

#[tokio::test]
async fn test_timeout_is_backend_unavailable() -> anyhow::Result<()> {
    let server = MockBackend::start(
        MockReply::json(200, json!({"choices": [{"text": "too late"}]})).delayed(Duration::from_secs(2)),
    )
    .await?;

    let result = client(server.base_url(), Dialect::Completion)
        .generate(&prompt(), Duration::from_millis(200))
        .await;
    let failure = result.failure().unwrap();
    assert!(matches!(failure, NoteFailure::BackendUnavailable { .. }));
    assert!(failure.is_retryable());

    // Handler is still sleeping; dropping aborts the server task
    drop(server);
    Ok(())
}

#[tokio::test]
async fn test_connection_refused() -> anyhow::Result<()> {
    let result = client(unused_base_url().await?, Dialect::Completion)
        .generate(&prompt(), Duration::from_secs(2))
        .await;
    assert!(matches!(
        result.failure(),
        Some(NoteFailure::BackendUnavailable { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_bearer_token_sent() -> anyhow::Result<()> {
    let server = MockBackend::start(MockReply::json(200, json!({"choices": [{"text": "ok"}]}))).await?;

    let client = HttpNoteClient::new(BackendConfig {
        base_url: server.base_url(),
        api_key: Some("test-key".to_string()),
        model: "local-model".to_string(),
        temperature: 0.2,
        ..Default::default()
    })?;
    let result = client.generate(&prompt(), Duration::from_secs(5)).await;
    assert!(result.is_success());

    let requests = server.requests();
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(requests[0].body["model"], "local-model");
    assert!((requests[0].body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);

    server.shutdown().await
}
