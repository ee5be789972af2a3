//! # Provider Adapters
//!
//! Every LLM vendor sits behind one trait, [`LlmProvider`], with a single
//! operation: turn a prompt plus the LLM node's configuration into text. The
//! executor looks adapters up in a [`ProviderRegistry`] by [`Provider`] and
//! never branches on the vendor itself, so adding a vendor means adding an
//! adapter and registering it.
//!
//! ## Built-in Adapters
//!
//! - [`OpenAiProvider`] (feature: `openai`): chat completions with a single
//!   user message, forwarding model, temperature and token limit
//! - [`GeminiProvider`] (feature: `gemini`): content generation against a
//!   fixed model, forwarding only the prompt
//!
//! Each invocation is one remote call. There are no retries and no streaming.
//!
//! ## Errors
//!
//! Adapters report failures as [`ProviderError`], classified by
//! [`ProviderError::classify`]: 429 means quota, 404 means an unknown model, a
//! message mentioning an API key means a rejected credential, and anything
//! else carries the upstream message verbatim.

use crate::LlmFlowResult;
use crate::config::ProviderSettings;
use crate::node::{LlmConfig, Provider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

mod error;
pub use error::ProviderError;

#[cfg(any(feature = "openai", feature = "gemini"))]
mod http;

#[cfg(feature = "openai")]
mod openai;
#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;

#[cfg(feature = "gemini")]
mod gemini;
#[cfg(feature = "gemini")]
pub use gemini::GeminiProvider;

/// Text returned when a provider answers without any content
pub const NO_RESPONSE_FALLBACK: &str = "No response generated";

/// Trait for LLM provider adapters.
///
/// Implement this trait to add support for a new vendor.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// The vendor this adapter talks to
    fn provider(&self) -> Provider;

    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProviderError`] when the call fails.
    async fn generate(&self, prompt: &str, config: &LlmConfig) -> Result<String, ProviderError>;
}

/// Adapters keyed by the provider they serve
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every adapter compiled into the crate
    ///
    /// # Errors
    ///
    /// Returns [`LlmFlowError::ConfigError`](crate::LlmFlowError::ConfigError)
    /// if an adapter's HTTP client cannot be built.
    pub fn from_settings(settings: &ProviderSettings) -> LlmFlowResult<Self> {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "openai")]
        registry.register(OpenAiProvider::from_settings(settings)?);

        #[cfg(feature = "gemini")]
        registry.register(GeminiProvider::from_settings(settings)?);

        #[cfg(not(any(feature = "openai", feature = "gemini")))]
        let _ = settings;

        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same provider
    pub fn register<P>(&mut self, provider: P) -> &mut Self
    where
        P: LlmProvider + 'static,
    {
        self.register_arc(Arc::new(provider))
    }

    /// Register a shared adapter
    pub fn register_arc(&mut self, provider: Arc<dyn LlmProvider>) -> &mut Self {
        self.providers.insert(provider.provider(), provider);
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<P>(mut self, provider: P) -> Self
    where
        P: LlmProvider + 'static,
    {
        self.register(provider);
        self
    }

    /// Look up the adapter for `provider`
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(&provider).cloned()
    }

    /// Check whether `provider` has an adapter
    pub fn contains(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    /// Generate through the adapter registered for `config.provider`
    pub async fn generate(&self, prompt: &str, config: &LlmConfig) -> Result<String, ProviderError> {
        let adapter = self
            .get(config.provider)
            .ok_or(ProviderError::NotConfigured(config.provider))?;
        adapter.generate(prompt, config).await
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&Provider> = self.providers.keys().collect();
        providers.sort_by_key(|p| p.as_str());
        f.debug_struct("ProviderRegistry")
            .field("providers", &providers)
            .finish()
    }
}
