//! MedPrompt note client
//!
//! Sends a [`ClinicalPrompt`](medprompt_core::ClinicalPrompt) to an
//! OpenAI-compatible text backend and returns a [`NoteResult`]. Two wire
//! dialects are supported, selected by configuration:
//!
//! | Dialect      | Endpoint                   | Response text                 |
//! |--------------|----------------------------|-------------------------------|
//! | `completion` | `{base}/completions`       | `choices[0].text`             |
//! | `chat`       | `{base}/chat/completions`  | `choices[0].message.content`  |
//!
//! Transport problems never surface as `Err`. Timeouts, refused connections,
//! 408, 429 and 5xx responses become retryable `BackendUnavailable` failures.
//! Other refusals become `Rejected`, and malformed bodies become
//! `EmptyResponse`.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod dialect;
pub mod error;
pub mod mock;

pub use client::{HttpNoteClient, NoteBackendClient};
pub use config::BackendConfig;
pub use dialect::{parse_response, parse_response_bytes, request_body, Dialect, GenerationParams};
pub use error::{Error, NoteFailure, NoteResult, Result};
pub use mock::MockNoteClient;
