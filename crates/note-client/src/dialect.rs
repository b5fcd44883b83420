//! Wire dialects for OpenAI-compatible text backends
//!
//! - completion: `POST /completions`, body carries one `prompt` string,
//!   response text at `choices[0].text`
//! - chat: `POST /chat/completions`, body carries `messages`, response text at
//!   `choices[0].message.content`
//!
//! Response parsing never indexes blindly. Anything missing or blank is an
//! `EmptyResponse`.

use crate::error::NoteFailure;
use medprompt_core::ClinicalPrompt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Request/response shape spoken by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Single prompt string
    #[default]
    Completion,
    /// Role-tagged message list
    Chat,
}

impl Dialect {
    /// Path relative to the backend base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            Dialect::Completion => "completions",
            Dialect::Chat => "chat/completions",
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completion" | "completions" => Ok(Dialect::Completion),
            "chat" => Ok(Dialect::Chat),
            other => Err(format!("unknown dialect '{}', expected 'completion' or 'chat'", other)),
        }
    }
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

/// JSON body for `prompt` in the given dialect
pub fn request_body(dialect: Dialect, prompt: &ClinicalPrompt, params: &GenerationParams) -> Value {
    let body = match dialect {
        Dialect::Completion => serde_json::to_value(CompletionRequest {
            model: &params.model,
            prompt: prompt.flatten(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }),
        Dialect::Chat => serde_json::to_value(ChatRequest {
            model: &params.model,
            messages: prompt
                .segments()
                .iter()
                .map(|s| ChatMessage {
                    role: s.role.as_str(),
                    content: &s.content,
                })
                .collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }),
    };

    // Plain structs of strings and numbers always serialize
    body.unwrap_or(Value::Null)
}

/// Extract note text from a parsed response body
pub fn parse_response(dialect: Dialect, body: &Value) -> Result<String, NoteFailure> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| NoteFailure::empty("response has no 'choices' array"))?
        .first()
        .ok_or_else(|| NoteFailure::empty("'choices' is empty"))?;

    let text = match dialect {
        Dialect::Completion => choice
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| NoteFailure::empty("choice has no 'text'"))?,
        Dialect::Chat => choice
            .get("message")
            .ok_or_else(|| NoteFailure::empty("choice has no 'message'"))?
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| NoteFailure::empty("message has no 'content'"))?,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(NoteFailure::empty("generated text is blank"));
    }
    Ok(text.to_string())
}

/// Parse raw response bytes; invalid JSON is an empty response
pub fn parse_response_bytes(dialect: Dialect, bytes: &[u8]) -> Result<String, NoteFailure> {
    let body: Value = serde_json::from_slice(bytes)
        .map_err(|e| NoteFailure::empty(format!("response is not valid JSON: {}", e)))?;
    parse_response(dialect, &body)
}
