//! Note generation client abstraction

use crate::config::BackendConfig;
use crate::dialect::{parse_response_bytes, request_body};
use crate::error::{NoteFailure, NoteResult, Result};
use async_trait::async_trait;
use medprompt_core::ClinicalPrompt;
use std::time::{Duration, Instant};

/// Longest response body kept on a `Rejected` failure
const MAX_ERROR_BODY: usize = 2048;

/// Trait for text-generation backends
///
/// Implementations never return an `Err`; every outcome, including transport
/// failures, is a `NoteResult`.
#[async_trait]
pub trait NoteBackendClient: Send + Sync {
    /// Generate a note for `prompt`, giving up after `timeout`
    async fn generate(&self, prompt: &ClinicalPrompt, timeout: Duration) -> NoteResult;

    /// Get the name of this client (for logging)
    fn name(&self) -> &str;
}

/// OpenAI-compatible HTTP backend (LM Studio, vLLM, llama.cpp server, ...)
pub struct HttpNoteClient {
    config: BackendConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpNoteClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;

        // Per-request timeouts come from `generate`
        let client = reqwest::Client::builder()
            .user_agent(concat!("medprompt/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoint = config.endpoint_url();
        tracing::debug!(endpoint = %endpoint, dialect = ?config.dialect, model = %config.model, "Created note backend client");

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Statuses worth trying again later
    fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429 | 500..=599)
    }

    fn classify_transport_error(error: &reqwest::Error) -> NoteFailure {
        if error.is_timeout() {
            NoteFailure::unavailable(format!("request timed out: {}", error))
        } else if error.is_connect() {
            NoteFailure::unavailable(format!("connection failed: {}", error))
        } else {
            NoteFailure::unavailable(format!("request failed: {}", error))
        }
    }

    async fn send(&self, prompt: &ClinicalPrompt, timeout: Duration) -> std::result::Result<String, NoteFailure> {
        let body = request_body(self.config.dialect, prompt, &self.config.params());

        let mut request = self.client.post(&self.endpoint).timeout(timeout).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::classify_transport_error(&e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            if Self::is_retryable_status(status) {
                return Err(NoteFailure::unavailable(format!("HTTP {}: {}", status, truncate(&text))));
            }
            return Err(NoteFailure::Rejected {
                status,
                body: truncate(&text),
            });
        }

        // Timeout also covers reading the body
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::classify_transport_error(&e))?;

        parse_response_bytes(self.config.dialect, &bytes)
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl NoteBackendClient for HttpNoteClient {
    async fn generate(&self, prompt: &ClinicalPrompt, timeout: Duration) -> NoteResult {
        let start = Instant::now();
        let result = self.send(prompt, timeout).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(text) => tracing::info!(
                endpoint = %self.endpoint,
                elapsed_ms,
                chars = text.len(),
                "Note generated"
            ),
            Err(failure) => tracing::warn!(
                endpoint = %self.endpoint,
                elapsed_ms,
                retryable = failure.is_retryable(),
                error = %failure,
                "Note generation failed"
            ),
        }

        result.into()
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_is_retryable_status() {
        assert!(HttpNoteClient::is_retryable_status(408));
        assert!(HttpNoteClient::is_retryable_status(429));
        assert!(HttpNoteClient::is_retryable_status(500));
        assert!(HttpNoteClient::is_retryable_status(503));

        assert!(!HttpNoteClient::is_retryable_status(400));
        assert!(!HttpNoteClient::is_retryable_status(401));
        assert!(!HttpNoteClient::is_retryable_status(404));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = BackendConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(matches!(HttpNoteClient::new(config), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_endpoint_from_config() {
        let client = HttpNoteClient::new(BackendConfig::default()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/completions");
        assert_eq!(client.name(), "http");
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let short = truncate(&body);
        assert!(short.ends_with("..."));
        assert!(short.len() <= MAX_ERROR_BODY + 3);
        assert_eq!(truncate("bad request"), "bad request");
    }
}
