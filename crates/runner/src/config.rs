//! Configuration for the study runner
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! Environment variables override file values.

use medprompt_core::{ImagingConfig, ImagingPipeline};
use medprompt_note_client::{BackendConfig, Dialect};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Frame selection, tensor and findings settings
    #[serde(default)]
    pub imaging: ImagingConfig,

    /// Text backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Worker pool
    #[serde(default)]
    pub runner: WorkerConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Studies processed at once by `run_batch`
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    num_cpus::get().max(1)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl RunnerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// File (when given and present), then environment, then validation
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `MEDPROMPT_*` overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Backend
        if let Some(url) = lookup("MEDPROMPT_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(dialect) = lookup("MEDPROMPT_BACKEND_DIALECT") {
            self.backend.dialect = dialect
                .parse::<Dialect>()
                .map_err(|e| ConfigError::Invalid(format!("MEDPROMPT_BACKEND_DIALECT: {}", e)))?;
        }
        if let Some(model) = lookup("MEDPROMPT_MODEL") {
            self.backend.model = model;
        }
        if let Some(key) = lookup("MEDPROMPT_API_KEY") {
            self.backend.api_key = (!key.is_empty()).then_some(key);
        }
        if let Some(timeout) = lookup("MEDPROMPT_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_number("MEDPROMPT_TIMEOUT_SECS", &timeout)?;
        }

        // Worker pool
        if let Some(max) = lookup("MEDPROMPT_MAX_CONCURRENCY") {
            self.runner.max_concurrency = parse_number("MEDPROMPT_MAX_CONCURRENCY", &max)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        ImagingPipeline::from_config(&self.imaging).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.runner.max_concurrency == 0 {
            return Err(ConfigError::Invalid("runner.max_concurrency must be positive".to_string()));
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
