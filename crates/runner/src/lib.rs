//! MedPrompt runner
//!
//! Ties the imaging stage from `medprompt-core` to a note backend from
//! `medprompt-note-client`. The inference model and the backend are injected,
//! so the same runner serves production, offline and test setups.
//!
//! ```ignore
//! let config = RunnerConfig::load(Some("medprompt.toml"))?;
//! let runner = StudyRunner::connect(&config)?;
//! let report = runner.run(StudyInput::new(pixels, attributes)).await?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod runner;

mod error;
pub use error::{Error, Result};

pub use config::{ConfigError, RunnerConfig, WorkerConfig};
pub use runner::{StudyInput, StudyReport, StudyRunner};
