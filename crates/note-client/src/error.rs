//! Error and result types for the note backend

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for client construction
pub type Result<T> = std::result::Result<T, Error>;

/// Client construction errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid backend configuration
    #[error("Invalid backend configuration: {0}")]
    Configuration(String),

    /// HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a note could not be generated
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteFailure {
    /// Timeout, connection failure, overload or server error
    #[error("Backend unavailable: {reason}")]
    BackendUnavailable {
        /// Failure detail
        reason: String,
    },

    /// Response arrived but held no usable text
    #[error("Empty response: {reason}")]
    EmptyResponse {
        /// What was missing
        reason: String,
    },

    /// Backend refused the request (4xx other than 429)
    #[error("Backend rejected request with HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },
}

impl NoteFailure {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
        }
    }

    pub fn empty(reason: impl Into<String>) -> Self {
        Self::EmptyResponse {
            reason: reason.into(),
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, NoteFailure::BackendUnavailable { .. })
    }
}

/// Outcome of a note generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum NoteResult {
    /// Finished note text
    Success(String),
    /// Reason no note was produced
    Failure(NoteFailure),
}

impl NoteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, NoteResult::Success(_))
    }

    /// Note text, if generation succeeded
    pub fn text(&self) -> Option<&str> {
        match self {
            NoteResult::Success(text) => Some(text),
            NoteResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&NoteFailure> {
        match self {
            NoteResult::Success(_) => None,
            NoteResult::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> std::result::Result<String, NoteFailure> {
        match self {
            NoteResult::Success(text) => Ok(text),
            NoteResult::Failure(failure) => Err(failure),
        }
    }
}

impl From<std::result::Result<String, NoteFailure>> for NoteResult {
    fn from(result: std::result::Result<String, NoteFailure>) -> Self {
        match result {
            Ok(text) => NoteResult::Success(text),
            Err(failure) => NoteResult::Failure(failure),
        }
    }
}
