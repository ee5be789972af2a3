//! Provider error types.

use crate::node::Provider;

/// Errors that can occur when calling an LLM provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// HTTP 429 from the provider
    #[error("API quota exceeded. Please check your billing details and plan limits.")]
    QuotaExceeded,

    /// HTTP 404 from the provider
    #[error("The selected model is not available. Please check the model name.")]
    InvalidModel,

    /// The provider rejected the credential
    #[error("Invalid API key. Please check your API key.")]
    InvalidApiKey,

    /// No adapter is registered for the provider
    #[error("Provider '{0}' is not configured")]
    NotConfigured(Provider),

    /// Any other failure, carrying the upstream message verbatim
    #[error("{0}")]
    Upstream(String),
}

impl ProviderError {
    /// Map a failed call onto the error taxonomy.
    ///
    /// Status codes win over message inspection: 429 is a quota problem and
    /// 404 an unknown model whatever the body says. Otherwise a message
    /// mentioning an "api key" (any case) is a credential problem, and
    /// everything else is passed through untouched.
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            Some(429) => ProviderError::QuotaExceeded,
            Some(404) => ProviderError::InvalidModel,
            _ if message.to_ascii_lowercase().contains("api key") => ProviderError::InvalidApiKey,
            _ => ProviderError::Upstream(message),
        }
    }

    /// Notification title for this failure
    pub fn title(&self) -> &'static str {
        match self {
            ProviderError::QuotaExceeded => "Quota Exceeded",
            ProviderError::InvalidModel => "Invalid Model",
            ProviderError::InvalidApiKey => "Invalid API Key",
            ProviderError::NotConfigured(_) => "Configuration Error",
            ProviderError::Upstream(_) => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_take_precedence() {
        assert_eq!(
            ProviderError::classify(Some(429), "Incorrect API key provided"),
            ProviderError::QuotaExceeded
        );
        assert_eq!(
            ProviderError::classify(Some(404), "model `gpt-5` does not exist"),
            ProviderError::InvalidModel
        );
    }

    #[test]
    fn test_api_key_messages() {
        assert_eq!(
            ProviderError::classify(Some(401), "Incorrect API key provided: sk-abc***"),
            ProviderError::InvalidApiKey
        );
        assert_eq!(
            ProviderError::classify(Some(400), "API key not valid. Please pass a valid API key."),
            ProviderError::InvalidApiKey
        );
        assert_eq!(
            ProviderError::classify(None, "missing api key"),
            ProviderError::InvalidApiKey
        );
    }

    #[test]
    fn test_other_failures_are_verbatim() {
        let err = ProviderError::classify(Some(500), "The server had an error");
        assert_eq!(err, ProviderError::Upstream("The server had an error".to_string()));
        assert_eq!(err.to_string(), "The server had an error");

        let err = ProviderError::classify(None, "error sending request");
        assert_eq!(err.to_string(), "error sending request");
    }

    #[test]
    fn test_quota_message_wording() {
        assert!(
            ProviderError::QuotaExceeded
                .to_string()
                .starts_with("API quota exceeded")
        );
        assert_eq!(
            ProviderError::NotConfigured(Provider::Gemini).to_string(),
            "Provider 'gemini' is not configured"
        );
    }
}
