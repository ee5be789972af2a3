//! Google Gemini content-generation adapter.

use super::http::{build_client, endpoint, error_from_response, transport_error};
use super::{LlmProvider, NO_RESPONSE_FALLBACK, ProviderError};
use crate::LlmFlowResult;
use crate::config::ProviderSettings;
use crate::node::{LlmConfig, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Calls `POST {base}/models/{model}:generateContent` with the prompt as the
/// only content.
///
/// The model is fixed by [`ProviderSettings::gemini_model`]; the node's model,
/// temperature and token limit are not forwarded.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    /// Create an adapter for the public Gemini API
    pub fn new() -> LlmFlowResult<Self> {
        Self::from_settings(&ProviderSettings::default())
    }

    /// Create an adapter using the configured base URL, model and timeout
    ///
    /// # Errors
    ///
    /// Returns [`LlmFlowError::ConfigError`](crate::LlmFlowError::ConfigError)
    /// if the HTTP client cannot be built.
    pub fn from_settings(settings: &ProviderSettings) -> LlmFlowResult<Self> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: settings.gemini_base_url.clone(),
            model: settings.gemini_model.clone(),
        })
    }

    /// The model requests are sent to
    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_url(&self) -> String {
        endpoint(
            &self.base_url,
            &format!("models/{}:generateContent", self.model),
        )
    }

    fn request(prompt: &str) -> GeminiRequest<'_> {
        GeminiRequest {
            contents: vec![GeminiRequestContent {
                role: "user",
                parts: vec![GeminiRequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiRequestContent<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestContent<'a> {
    role: &'static str,
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, or the fallback
    fn into_text(self) -> String {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            NO_RESPONSE_FALLBACK.to_string()
        } else {
            text
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %self.model))]
    async fn generate(&self, prompt: &str, config: &LlmConfig) -> Result<String, ProviderError> {
        debug!("requesting content generation");

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &config.api_key)
            .json(&Self::request(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let generated: GeminiResponse = response.json().await.map_err(transport_error)?;
        Ok(generated.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_carries_only_the_prompt() {
        let body = serde_json::to_value(GeminiProvider::request("hello")).unwrap();
        assert_eq!(
            body,
            json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]})
        );
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_api_url_uses_fixed_model() {
        let provider = GeminiProvider::from_settings(
            &ProviderSettings::default().with_gemini_base_url("http://localhost:1234/v1beta/"),
        )
        .unwrap();
        assert_eq!(
            provider.api_url(),
            "http://localhost:1234/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_parts_are_concatenated() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.into_text(), "Hello, world");
    }

    #[test]
    fn test_blocked_prompt_uses_fallback() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert_eq!(response.into_text(), NO_RESPONSE_FALLBACK);
    }
}
