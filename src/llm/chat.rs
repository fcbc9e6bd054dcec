//! Chat-completions client (OpenAI-compatible schema) with automatic retry for transient errors.
//!
//! Used for Groq, OpenAI and DeepSeek, which all accept the same request body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{LlmError, RetryConfig};
use super::retry::execute_with_retry;
use super::{ChatMessage, ProviderKind, Role, TextGenerationProvider};
use crate::subtasks::Prompt;

const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Client for `/chat/completions` style endpoints.
pub struct ChatCompletionsClient {
    client: Client,
    kind: ProviderKind,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    retry_config: RetryConfig,
}

impl ChatCompletionsClient {
    pub fn new(kind: ProviderKind, endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            kind,
            endpoint,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            retry_config: RetryConfig::default(),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, pooling).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &Prompt) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: vec![
                ChatMessage::new(Role::System, prompt.system.clone()),
                ChatMessage::new(Role::User, prompt.user.clone()),
            ],
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &ChatCompletionRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_send(&e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body, retry_after));
        }

        parse_chat_response(&body)
    }
}

#[async_trait]
impl TextGenerationProvider for ChatCompletionsClient {
    fn name(&self) -> &str {
        self.kind.id()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let request = self.build_request(prompt);

        tracing::debug!(
            "Sending request to {}: model={}",
            self.kind.display_name(),
            self.model
        );

        execute_with_retry(&self.retry_config, self.kind.id(), || {
            self.execute_request(&request)
        })
        .await
    }
}

/// Parse Retry-After header (seconds) if present.
pub(super) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Extract the first choice's message text from a chat-completions body.
pub fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::parse_error(format!("Failed to parse response: {}", e)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))?;

    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}

/// Chat-completions request format.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

/// Chat-completions response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
