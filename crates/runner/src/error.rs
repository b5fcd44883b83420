use crate::config::ConfigError;
use thiserror::Error;

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a study
///
/// Inference and backend failures do not appear here; they are recorded on
/// the `StudyReport`.
#[derive(Error, Debug)]
pub enum Error {
    /// Input could not be normalized or composed
    #[error("Imaging error: {0}")]
    Imaging(#[from] medprompt_core::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend client could not be constructed
    #[error("Backend client error: {0}")]
    Backend(#[from] medprompt_note_client::Error),

    /// Worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(String),
}
