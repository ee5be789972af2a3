//! OpenAI chat-completion adapter.

use super::http::{build_client, endpoint, error_from_response, transport_error};
use super::{LlmProvider, NO_RESPONSE_FALLBACK, ProviderError};
use crate::LlmFlowResult;
use crate::config::ProviderSettings;
use crate::node::{LlmConfig, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Calls `POST {base}/chat/completions` with a single user message.
///
/// The API key travels with each request's [`LlmConfig`], so one adapter
/// serves every LLM node.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiProvider {
    /// Create an adapter for the public OpenAI API
    pub fn new() -> LlmFlowResult<Self> {
        Self::from_settings(&ProviderSettings::default())
    }

    /// Create an adapter using the configured base URL and timeout
    ///
    /// # Errors
    ///
    /// Returns [`LlmFlowError::ConfigError`](crate::LlmFlowError::ConfigError)
    /// if the HTTP client cannot be built.
    pub fn from_settings(settings: &ProviderSettings) -> LlmFlowResult<Self> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: settings.openai_base_url.clone(),
        })
    }

    fn request<'a>(prompt: &'a str, config: &'a LlmConfig) -> ChatRequest<'a> {
        ChatRequest {
            model: &config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    /// First choice's content, or the fallback when there is none
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    #[instrument(skip_all, fields(provider = "openai", model = %config.model))]
    async fn generate(&self, prompt: &str, config: &LlmConfig) -> Result<String, ProviderError> {
        debug!(
            temperature = config.temperature,
            max_tokens = config.max_tokens,
            "requesting chat completion"
        );

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&config.api_key)
            .json(&Self::request(prompt, config))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let completion: ChatResponse = response.json().await.map_err(transport_error)?;
        Ok(completion.into_text())
    }
}
