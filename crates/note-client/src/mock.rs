//! In-process backend for tests and offline runs

use crate::client::NoteBackendClient;
use crate::error::{NoteFailure, NoteResult};
use async_trait::async_trait;
use medprompt_core::ClinicalPrompt;
use std::sync::Mutex;
use std::time::Duration;

/// Mock note backend
///
/// Returns predetermined notes based on configured rules and records every
/// prompt it receives.
pub struct MockNoteClient {
    /// Default note to return
    pub default_response: String,

    /// Specific notes for patterns in the flattened prompt
    pub pattern_responses: Vec<(String, String)>,

    /// When set, every call fails with this
    pub failure: Option<NoteFailure>,

    prompts: Mutex<Vec<String>>,
}

impl MockNoteClient {
    pub fn new() -> Self {
        Self {
            default_response: "Findings: no acute abnormality. Recommend routine follow-up.".to_string(),
            pattern_responses: Vec::new(),
            failure: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Add a pattern-based response
    pub fn with_pattern(mut self, pattern: &str, response: &str) -> Self {
        self.pattern_responses.push((pattern.to_string(), response.to_string()));
        self
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Fail every call
    pub fn failing(mut self, failure: NoteFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Prompts received so far, flattened
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for MockNoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteBackendClient for MockNoteClient {
    async fn generate(&self, prompt: &ClinicalPrompt, _timeout: Duration) -> NoteResult {
        let text = prompt.flatten();
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(text.clone());
        }

        if let Some(failure) = &self.failure {
            return NoteResult::Failure(failure.clone());
        }

        for (pattern, response) in &self.pattern_responses {
            if text.contains(pattern) {
                return NoteResult::Success(response.clone());
            }
        }

        NoteResult::Success(self.default_response.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
