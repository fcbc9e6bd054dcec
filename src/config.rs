//! Configuration management for subtask-suggest.
//!
//! Configuration can be set via environment variables:
//! - `LLM_PROVIDER` - Optional. `groq`, `openai`, `deepseek` or `gemini`. Defaults to `groq`.
//! - `LLM_API_KEY` - Optional. API key for the provider. Falls back to the provider's own
//!   variable (`GROQ_API_KEY`, `OPENAI_API_KEY`, `DEEPSEEK_API_KEY`, `GEMINI_API_KEY`).
//!   Without a key every request is answered with the fallback subtasks.
//! - `LLM_MODEL` - Optional. Model identifier. Defaults per provider.
//! - `LLM_BASE_URL` - Optional. Overrides the provider endpoint URL.
//! - `LLM_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.3`.
//! - `LLM_MAX_RETRIES` - Optional. Retries for transient upstream errors. Defaults to `2`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Upstream request timeout. Defaults to `30`.
//! - `SUBTASK_EXTRACTION` - Optional. `strict` or `lenient` line filtering. Defaults to `strict`.
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.

use std::time::Duration;

use thiserror::Error;

use crate::llm::ProviderKind;
use crate::subtasks::ExtractionLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream provider schema
    pub provider: ProviderKind,

    /// Provider API key; `None` puts the service in fallback-only mode
    pub api_key: Option<String>,

    /// Model identifier sent upstream
    pub model: String,

    /// Endpoint override (defaults to the provider's public URL)
    pub base_url: Option<String>,

    /// Sampling temperature
    pub temperature: f64,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Timeout for one upstream request
    pub request_timeout: Duration,

    /// Retries for transient upstream failures
    pub max_retries: u32,

    /// Line filtering limits used by the extractor
    pub extraction: ExtractionLimits,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider: ProviderKind = match var("LLM_PROVIDER") {
            Some(v) => v
                .parse()
                .map_err(|e| ConfigError::InvalidValue("LLM_PROVIDER".to_string(), e))?,
            None => ProviderKind::Groq,
        };

        let api_key = var("LLM_API_KEY").or_else(|| var(provider.api_key_env()));

        let model = var("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let base_url = var("LLM_BASE_URL");

        let temperature = parse_or("LLM_TEMPERATURE", var("LLM_TEMPERATURE"), 0.3)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "LLM_TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", temperature),
            ));
        }

        let max_retries = parse_or("LLM_MAX_RETRIES", var("LLM_MAX_RETRIES"), 2)?;

        let timeout_secs: u64 =
            parse_or("REQUEST_TIMEOUT_SECS", var("REQUEST_TIMEOUT_SECS"), 30)?;

        let extraction = match var("SUBTASK_EXTRACTION").map(|v| v.trim().to_lowercase()) {
            None => ExtractionLimits::strict(),
            Some(mode) if mode == "strict" => ExtractionLimits::strict(),
            Some(mode) if mode == "lenient" => ExtractionLimits::lenient(),
            Some(mode) => {
                return Err(ConfigError::InvalidValue(
                    "SUBTASK_EXTRACTION".to_string(),
                    format!("'{}' (expected strict or lenient)", mode),
                ))
            }
        };

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = parse_or("PORT", var("PORT"), 3000)?;

        Ok(Self {
            provider,
            api_key,
            model,
            base_url,
            temperature,
            host,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            max_retries,
            extraction,
        })
    }

    /// Create a config for `provider` with defaults everywhere else (useful for testing).
    pub fn for_provider(provider: ProviderKind, api_key: Option<String>) -> Self {
        Self {
            provider,
            api_key,
            model: provider.default_model().to_string(),
            base_url: None,
            temperature: 0.3,
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            extraction: ExtractionLimits::strict(),
        }
    }

    /// Endpoint URL requests are sent to.
    pub fn endpoint(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_endpoint(&self.model))
    }

    /// Whether upstream calls are possible (an API key is configured).
    pub fn ai_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
