//! # llmflow-rs
//!
//! The execution core of a visual Input → LLM → Output workflow builder.
//!
//! A workflow is a small graph edited elsewhere:
//! - **Input node**: holds the prompt text
//! - **LLM node**: holds the provider, API key, model, temperature and token limit
//! - **Output node**: receives the generated text (or an error) plus a loading flag
//!
//! One run validates the input and LLM nodes, calls the selected provider
//! once, and writes the outcome into the output node. Nodes are shared with
//! the editor through a copy-on-write [`NodeStore`], and every failure is
//! reported through a [`Notifier`].
//!
//! ## 🏗️ Feature Architecture
//!
//! ### Providers
//! - `openai`: OpenAI chat completions adapter
//! - `gemini`: Google Gemini content generation adapter
//!
//! ### Front End
//! - `cli`: the `llmflow` binary (`init`, `run`)
//!
//! ### Convenience Features
//! - `default`: `openai` + `gemini`
//! - `full`: everything
//!
//! Without any provider feature the crate still builds; runs then fail with
//! [`ProviderError::NotConfigured`] unless you register your own
//! [`LlmProvider`].
//!
//! ## 🚀 Quick Start
//!
//! ```toml
//! llmflow-rs = "0.1"
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use llmflow_rs::prelude::*;
//!
//! # async fn demo() -> LlmFlowResult<()> {
//! let mut graph = WorkflowGraph::initial();
//! graph.update_node_data("input-1", InputData::new("What is Rust?").to_data())?;
//! graph.update_node_data("llm-1", LlmConfig::new(Provider::OpenAi, "sk-...").to_data())?;
//!
//! let executor = WorkflowExecutor::from_settings(&ProviderSettings::from_env()?)?;
//! let ctx = WorkflowContext::with_nodes(graph.nodes);
//!
//! let nodes = executor.trigger(&ctx).await?;
//! if let Some(output) = first_of_kind(&nodes, NodeKind::Output) {
//!     println!("{}", output.output_data().value);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod flow;
pub mod graph;
pub mod node;
pub mod notify;
pub mod provider;
pub mod shared_store;
pub mod validation;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::ProviderSettings;
pub use flow::{ExecutionState, RunOutcome, WorkflowContext, WorkflowExecutor};
pub use graph::{Edge, WorkflowGraph};
pub use node::{
    InputData, LlmConfig, Node, NodeData, NodeKind, OutputData, Provider, first_of_kind,
};
pub use notify::{
    ChannelNotifier, MemoryNotifier, Notification, Notifier, Severity, TracingNotifier,
};
pub use provider::{LlmProvider, ProviderError, ProviderRegistry};
pub use shared_store::{NodeSnapshot, NodeStore};
pub use validation::{ValidationError, validate, validate_api_key};

/// OpenAI adapter
#[cfg(feature = "openai")]
pub use provider::OpenAiProvider;

/// Gemini adapter
#[cfg(feature = "gemini")]
pub use provider::GeminiProvider;

// ============================================================================
// CONVENIENCE RE-EXPORTS
// ============================================================================

/// Commonly used external types
pub use serde_json::Value as JsonValue;

/// Convenient re-exports for common types and traits
pub mod prelude {
    pub use crate::{
        Edge, ExecutionState, InputData, LlmConfig, LlmFlowError, LlmFlowResult, LlmProvider,
        MemoryNotifier, Node, NodeData, NodeKind, NodeStore, Notification, Notifier, OutputData,
        Provider, ProviderError, ProviderRegistry, ProviderSettings, RunOutcome, Severity,
        TracingNotifier, ValidationError, WorkflowContext, WorkflowExecutor, WorkflowGraph,
        first_of_kind, validate, validate_api_key,
    };

    #[cfg(feature = "openai")]
    pub use crate::OpenAiProvider;

    #[cfg(feature = "gemini")]
    pub use crate::GeminiProvider;

    pub use serde_json::Value as JsonValue;
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Result type alias for llmflow operations
pub type LlmFlowResult<T> = Result<T, LlmFlowError>;

/// Errors from the surfaces around a run: editing, persistence, configuration
/// and the run trigger.
///
/// Failures inside a run are never returned; they become notifications.
#[derive(Debug, thiserror::Error)]
pub enum LlmFlowError {
    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error reading or writing a workflow file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No node with the given id
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A triggered run is still in flight
    #[error("A workflow run is already in progress")]
    AlreadyRunning,
}

// ============================================================================
// INTEGRATION TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_error.is_err());

        let err: LlmFlowError = json_error.unwrap_err().into();
        assert!(matches!(err, LlmFlowError::SerializationError(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LlmFlowError::NodeNotFound("llm-9".to_string()).to_string(),
            "Node not found: llm-9"
        );
        assert_eq!(
            LlmFlowError::AlreadyRunning.to_string(),
            "A workflow run is already in progress"
        );
    }

    #[test]
    fn test_initial_graph_validates_as_missing_input() {
        let graph = WorkflowGraph::initial();
        let input = first_of_kind(&graph.nodes, NodeKind::Input).unwrap();
        let llm = first_of_kind(&graph.nodes, NodeKind::Llm).unwrap();
        assert_eq!(
            validate(&input.input_data(), &llm.llm_config()),
            Err(ValidationError::MissingInput)
        );
    }
}
