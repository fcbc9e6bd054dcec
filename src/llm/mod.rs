//! Text generation providers.
//!
//! This module provides a trait-based abstraction over the upstream LLM APIs.
//! Two request schemas are supported:
//! - chat completions (Groq, OpenAI, DeepSeek), see [`ChatCompletionsClient`]
//! - generate content (Gemini), see [`GeminiClient`]
//!
//! Callers only see [`TextGenerationProvider::complete`], which returns the
//! model's raw text for further normalization.

mod chat;
mod error;
mod gemini;
mod retry;

pub use chat::{parse_chat_response, ChatCompletionsClient};
pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use gemini::{parse_generate_content_response, GeminiClient};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::subtasks::Prompt;

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

/// Upstream API a deployment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Gemini,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAI => "openai",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Groq => "Groq",
            Self::OpenAI => "OpenAI",
            Self::DeepSeek => "DeepSeek",
            Self::Gemini => "Google Gemini",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Groq => "llama3-8b-8192",
            Self::OpenAI => "gpt-4o-mini",
            Self::DeepSeek => "deepseek-chat",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    /// Default request URL for `model`.
    pub fn default_endpoint(&self, model: &str) -> String {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            Self::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            Self::DeepSeek => "https://api.deepseek.com/chat/completions".to_string(),
            Self::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                model
            ),
        }
    }

    /// Whether the provider speaks the OpenAI chat-completions schema.
    pub fn is_chat_completions(&self) -> bool {
        !matches!(self, Self::Gemini)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            "deepseek" => Ok(Self::DeepSeek),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(format!(
                "unknown provider '{}' (expected groq, openai, deepseek or gemini)",
                other
            )),
        }
    }
}

/// Capability to turn a prompt into raw model text.
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    /// Provider identifier used in logs and health output.
    fn name(&self) -> &str;

    /// Send the prompt upstream and return the model's raw text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

pub type ProviderRef = Arc<dyn TextGenerationProvider>;

/// Build the configured provider, or `None` when no API key is set.
pub fn build_provider(config: &Config) -> anyhow::Result<Option<ProviderRef>> {
    let Some(api_key) = config.api_key.clone() else {
        return Ok(None);
    };

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    let endpoint = config.endpoint();
    let retry_config = RetryConfig {
        max_retries: config.max_retries,
        ..RetryConfig::default()
    };

    let provider: ProviderRef = if config.provider.is_chat_completions() {
        Arc::new(
            ChatCompletionsClient::new(config.provider, endpoint, api_key, config.model.clone())
                .with_http_client(http)
                .with_temperature(config.temperature)
                .with_retry_config(retry_config),
        )
    } else {
        Arc::new(
            GeminiClient::new(endpoint, api_key)
                .with_http_client(http)
                .with_temperature(config.temperature)
                .with_retry_config(retry_config),
        )
    };

    Ok(Some(provider))
}
