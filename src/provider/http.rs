//! HTTP plumbing shared by the REST adapters.

use super::ProviderError;
use crate::config::ProviderSettings;
use crate::{LlmFlowError, LlmFlowResult};
use serde::Deserialize;

/// Body shape both OpenAI and Gemini use for failures
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Build the HTTP client used by an adapter
pub(crate) fn build_client(settings: &ProviderSettings) -> LlmFlowResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = settings.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| LlmFlowError::ConfigError(format!("cannot build HTTP client: {e}")))
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a transport failure (connect, TLS, timeout, decode) onto the taxonomy
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::classify(err.status().map(|s| s.as_u16()), err.to_string())
}

/// Turn a non-success response into a [`ProviderError`]
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        }
    });
    ProviderError::classify(Some(status.as_u16()), message)
}

/// Pull `error.message` out of an error body, if it has one
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty())
}
