//! Provider endpoint configuration.
//!
//! Per-run settings (key, model, temperature, token limit) live on the LLM
//! node. What stays constant across runs, such as endpoints and the Gemini
//! model id, lives in [`ProviderSettings`].

use crate::{LlmFlowError, LlmFlowResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI REST base
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default Gemini REST base
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model every Gemini request is sent to
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Environment variable overriding [`ProviderSettings::openai_base_url`]
pub const ENV_OPENAI_BASE_URL: &str = "LLMFLOW_OPENAI_BASE_URL";
/// Environment variable overriding [`ProviderSettings::gemini_base_url`]
pub const ENV_GEMINI_BASE_URL: &str = "LLMFLOW_GEMINI_BASE_URL";
/// Environment variable overriding [`ProviderSettings::gemini_model`]
pub const ENV_GEMINI_MODEL: &str = "LLMFLOW_GEMINI_MODEL";
/// Environment variable setting [`ProviderSettings::request_timeout_secs`]
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "LLMFLOW_REQUEST_TIMEOUT_SECS";

/// Settings shared by every provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL for OpenAI requests
    pub openai_base_url: String,
    /// Base URL for Gemini requests
    pub gemini_base_url: String,
    /// Gemini model id
    pub gemini_model: String,
    /// Transport timeout in seconds; `None` leaves the client default in place
    pub request_timeout_secs: Option<u64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_base_url: OPENAI_API_BASE.to_string(),
            gemini_base_url: GEMINI_API_BASE.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl ProviderSettings {
    /// Load settings from the process environment, defaulting unset values
    pub fn from_env() -> LlmFlowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> LlmFlowResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(url) = read(ENV_OPENAI_BASE_URL) {
            settings.openai_base_url = url;
        }
        if let Some(url) = read(ENV_GEMINI_BASE_URL) {
            settings.gemini_base_url = url;
        }
        if let Some(model) = read(ENV_GEMINI_MODEL) {
            settings.gemini_model = model;
        }
        if let Some(raw) = read(ENV_REQUEST_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                LlmFlowError::ConfigError(format!("{ENV_REQUEST_TIMEOUT_SECS}={raw}: {e}"))
            })?;
            settings.request_timeout_secs = Some(secs);
        }

        Ok(settings)
    }

    /// Transport timeout, if one is configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Set the OpenAI base URL
    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = url.into();
        self
    }

    /// Set the Gemini base URL
    pub fn with_gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.gemini_base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let settings = ProviderSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, ProviderSettings::default());
        assert_eq!(settings.gemini_model, "gemini-pro");
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn test_overrides_are_applied() {
        let settings = ProviderSettings::from_lookup(lookup(&[
            (ENV_OPENAI_BASE_URL, "http://localhost:8080/v1"),
            (ENV_GEMINI_MODEL, "gemini-1.5-flash"),
            (ENV_GEMINI_BASE_URL, "  "),
            (ENV_REQUEST_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();

        assert_eq!(settings.openai_base_url, "http://localhost:8080/v1");
        assert_eq!(settings.gemini_model, "gemini-1.5-flash");
        assert_eq!(settings.gemini_base_url, GEMINI_API_BASE);
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_bad_timeout_is_a_config_error() {
        let err = ProviderSettings::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, LlmFlowError::ConfigError(_)));
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));
    }
}
