//! Field validation for a run.
//!
//! Pure checks over the input and LLM node data. Nothing here notifies or
//! logs; the caller decides how to surface a [`ValidationError`].

use crate::node::{InputData, LlmConfig, Provider};

/// Every OpenAI secret key starts with this prefix.
pub const OPENAI_KEY_PREFIX: &str = "sk-";

/// Reasons a run is refused before any provider is contacted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The input node is absent or its text is blank
    #[error("Please enter an input question")]
    MissingInput,

    /// The LLM node is absent or has no API key
    #[error("Please enter your API key")]
    MissingApiKey,

    /// An OpenAI key without the `sk-` prefix
    #[error("OpenAI API key should start with 'sk-'. Please check your API key.")]
    MalformedApiKey,

    /// An OpenAI-looking key configured for Gemini
    #[error("You're using an OpenAI API key with Gemini. Please provide a valid Gemini API key.")]
    ProviderKeyMismatch,
}

impl ValidationError {
    /// Notification title for this failure
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::MissingInput => "Input Required",
            ValidationError::MissingApiKey => "Configuration Error",
            ValidationError::MalformedApiKey | ValidationError::ProviderKeyMismatch => {
                "Invalid API Key"
            }
        }
    }
}

/// Check that a run has a prompt and a key that fits its provider.
///
/// The input is checked first, so a run with neither reports
/// [`ValidationError::MissingInput`].
pub fn validate(input: &InputData, llm: &LlmConfig) -> Result<(), ValidationError> {
    validate_input(input)?;
    validate_api_key(&llm.api_key, llm.provider)
}

/// Check that the prompt is not blank
pub fn validate_input(input: &InputData) -> Result<(), ValidationError> {
    input
        .prompt()
        .map(|_| ())
        .ok_or(ValidationError::MissingInput)
}

/// Check an API key against the provider it will be sent to.
///
/// Usable on its own by editors that validate while the key is typed.
pub fn validate_api_key(api_key: &str, provider: Provider) -> Result<(), ValidationError> {
    if api_key.is_empty() {
        return Err(ValidationError::MissingApiKey);
    }

    let looks_like_openai = api_key.starts_with(OPENAI_KEY_PREFIX);
    match provider {
        Provider::OpenAi if !looks_like_openai => Err(ValidationError::MalformedApiKey),
        Provider::Gemini if looks_like_openai => Err(ValidationError::ProviderKeyMismatch),
        _ => Ok(()),
    }
}
