//! Backend connection settings

use crate::dialect::{Dialect, GenerationParams};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text backend configuration
///
/// Defaults target a local LM Studio server.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, without the endpoint path
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub dialect: Dialect,

    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Generation length limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sent as a bearer token when set
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_model() -> String {
    "openai/gpt-oss-20b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dialect: Dialect::default(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("dialect", &self.dialect)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Full URL for the configured dialect
    pub fn endpoint_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.dialect.endpoint())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration("base_url cannot be empty".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(Error::Configuration("model cannot be empty".to_string()));
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::Configuration(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }

        if self.max_tokens == 0 {
            return Err(Error::Configuration("max_tokens must be positive".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(Error::Configuration("timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}
