//! # Node Model - The Units of a Workflow Graph
//!
//! A workflow is an ordered collection of [`Node`] records. Every node carries
//! an id, a [`NodeKind`] and an open JSON `data` map. The graph editor owns the
//! collection and is free to keep extra keys (positions, callbacks, view state)
//! inside `data`; the runtime only reads and writes the fields it knows about.
//!
//! ## Node Kinds
//!
//! | Kind | Data fields | Role |
//! |------|-------------|------|
//! | `input` | `value` | The prompt text |
//! | `llm` | `apiKey`, `provider`, `model`, `temperature`, `maxTokens` | Provider configuration |
//! | `output` | `value`, `isLoading` | Rendered result or error, plus the in-flight flag |
//!
//! ## Typed Views
//!
//! Raw node data is read through typed views ([`InputData`], [`LlmConfig`],
//! [`OutputData`]). Views are lenient: each field is extracted on its own, so a
//! single malformed field falls back to its default instead of poisoning the
//! whole node.
//!
//! ```rust
//! use llmflow_rs::node::{LlmConfig, Node, NodeKind, Provider};
//! use serde_json::json;
//!
//! let mut node = Node::new("llm-1", NodeKind::Llm);
//! node.data.insert("apiKey".to_string(), json!("sk-test"));
//! node.data.insert("provider".to_string(), json!("gemini"));
//!
//! let config: LlmConfig = node.llm_config();
//! assert_eq!(config.provider, Provider::Gemini);
//! assert_eq!(config.max_tokens, 1000);
//! ```
//!
//! ## Copy-on-Write
//!
//! Nodes are never edited in place by the runtime. [`Node::merged`] and
//! [`OutputData::applied_to`] return fresh nodes so that snapshots already
//! handed to readers stay intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The open key/value payload of a node.
pub type NodeData = Map<String, Value>;

/// Model used for OpenAI requests when the node does not name one.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Sampling temperature used when the node does not set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Completion token limit used when the node does not set a positive one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Models offered by the editor for the OpenAI provider.
pub const OPENAI_MODELS: &[&str] = &["gpt-4", "gpt-3.5-turbo"];

/// The role a node plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Holds the prompt text
    Input,
    /// Holds the provider configuration
    Llm,
    /// Receives the generated text or the error message
    Output,
}

impl NodeKind {
    /// Wire name of the kind (`"input"`, `"llm"`, `"output"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Llm => "llm",
            NodeKind::Output => "output",
        }
    }

    /// Data a freshly created node of this kind starts with
    pub fn default_data(&self) -> NodeData {
        match self {
            NodeKind::Input => InputData::default().to_data(),
            NodeKind::Llm => LlmConfig::default().to_data(),
            NodeKind::Output => OutputData::default().to_data(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The LLM vendor selected on an LLM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Google Gemini content generation
    Gemini,
}

impl Provider {
    /// Wire name (`"openai"` or `"gemini"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }

    /// Label shown in the editor's provider selector
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "ChatGPT",
            Provider::Gemini => "Gemini",
        }
    }

    /// Every supported provider
    pub fn all() -> [Provider; 2] {
        [Provider::OpenAi, Provider::Gemini]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct ParseProviderError(pub String);

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            _ => Err(ParseProviderError(s.to_string())),
        }
    }
}

/// A single node of the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the collection
    pub id: String,
    /// What the node does
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Open payload, see the module docs for the known fields
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Create a node of `kind` carrying that kind's default data
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self::with_data(id, kind, kind.default_data())
    }

    /// Create a node with explicit data
    pub fn with_data(id: impl Into<String>, kind: NodeKind, data: NodeData) -> Self {
        Self {
            id: id.into(),
            kind,
            data,
        }
    }

    /// Check the node's kind
    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }

    /// Read the node's data as input fields
    pub fn input_data(&self) -> InputData {
        InputData::from_data(&self.data)
    }

    /// Read the node's data as LLM configuration
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig::from_data(&self.data)
    }

    /// Read the node's data as output fields
    pub fn output_data(&self) -> OutputData {
        OutputData::from_data(&self.data)
    }

    /// Return a copy of this node with `patch` shallow-merged into its data.
    ///
    /// Keys in `patch` overwrite existing keys; all other keys are kept.
    pub fn merged(&self, patch: &NodeData) -> Node {
        let mut data = self.data.clone();
        for (key, value) in patch {
            data.insert(key.clone(), value.clone());
        }
        Node {
            id: self.id.clone(),
            kind: self.kind,
            data,
        }
    }
}

/// Find the first node of the given kind, in collection order
pub fn first_of_kind(nodes: &[Node], kind: NodeKind) -> Option<&Node> {
    nodes.iter().find(|node| node.is(kind))
}

/// Fields of an input node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputData {
    /// The prompt text
    #[serde(default)]
    pub value: String,
}

impl InputData {
    /// Create input data holding `value`
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Extract input fields from raw node data
    pub fn from_data(data: &NodeData) -> Self {
        Self {
            value: string_field(data, "value").unwrap_or_default(),
        }
    }

    /// The prompt, or `None` when it is empty or only whitespace
    pub fn prompt(&self) -> Option<&str> {
        if self.value.trim().is_empty() {
            None
        } else {
            Some(&self.value)
        }
    }

    /// Encode as node data
    pub fn to_data(&self) -> NodeData {
        let mut data = NodeData::new();
        data.insert("value".to_string(), Value::String(self.value.clone()));
        data
    }
}

/// Configuration carried by an LLM node
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Credential for the selected provider
    pub api_key: String,
    /// Which vendor to call
    pub provider: Provider,
    /// Model name (OpenAI only; Gemini uses a fixed model)
    pub model: String,
    /// Sampling temperature in `[0, 1]`
    pub temperature: f64,
    /// Completion token limit, always positive
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            provider: Provider::default(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

// Keeps credentials out of logs and panic messages.
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<empty>"
        } else {
            "<redacted>"
        };
        f.debug_struct("LlmConfig")
            .field("api_key", &api_key)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmConfig {
    /// Create a configuration for `provider` with default sampling settings
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            provider,
            ..Default::default()
        }
    }

    /// Set the model; an empty name keeps the default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = normalize_model(Some(model.into()));
        self
    }

    /// Set the temperature, clamped into `[0, 1]`
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = normalize_temperature(Some(temperature));
        self
    }

    /// Set the token limit; zero keeps the default
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = normalize_max_tokens(Some(u64::from(max_tokens)));
        self
    }

    /// Extract configuration from raw node data.
    ///
    /// Missing or wrongly typed fields take their defaults. An unrecognised
    /// provider name falls back to OpenAI.
    pub fn from_data(data: &NodeData) -> Self {
        let provider = match string_field(data, "provider") {
            Some(name) => name.parse().unwrap_or_else(|err: ParseProviderError| {
                tracing::warn!(error = %err, "falling back to the default provider");
                Provider::default()
            }),
            None => Provider::default(),
        };

        Self {
            api_key: string_field(data, "apiKey").unwrap_or_default(),
            provider,
            model: normalize_model(string_field(data, "model")),
            temperature: normalize_temperature(data.get("temperature").and_then(Value::as_f64)),
            max_tokens: normalize_max_tokens(data.get("maxTokens").and_then(Value::as_u64)),
        }
    }

    /// Encode as node data
    pub fn to_data(&self) -> NodeData {
        let mut data = NodeData::new();
        data.insert("apiKey".to_string(), Value::String(self.api_key.clone()));
        data.insert(
            "provider".to_string(),
            Value::String(self.provider.as_str().to_string()),
        );
        data.insert("model".to_string(), Value::String(self.model.clone()));
        data.insert(
            "temperature".to_string(),
            serde_json::Number::from_f64(self.temperature)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        data.insert("maxTokens".to_string(), Value::from(self.max_tokens));
        data
    }
}

/// Fields of an output node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputData {
    /// Last rendered result or error string
    #[serde(default)]
    pub value: String,
    /// True only while a run is in flight
    #[serde(default)]
    pub is_loading: bool,
}

impl OutputData {
    /// Extract output fields from raw node data
    pub fn from_data(data: &NodeData) -> Self {
        Self {
            value: string_field(data, "value").unwrap_or_default(),
            is_loading: data
                .get("isLoading")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Encode as node data
    pub fn to_data(&self) -> NodeData {
        let mut data = NodeData::new();
        data.insert("value".to_string(), Value::String(self.value.clone()));
        data.insert("isLoading".to_string(), Value::Bool(self.is_loading));
        data
    }

    /// Return a copy of `node` with these output fields merged into its data
    pub fn applied_to(&self, node: &Node) -> Node {
        node.merged(&self.to_data())
    }
}

fn string_field(data: &NodeData, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn normalize_model(model: Option<String>) -> String {
    match model {
        Some(model) if !model.trim().is_empty() => model,
        _ => DEFAULT_OPENAI_MODEL.to_string(),
    }
}

fn normalize_temperature(temperature: Option<f64>) -> f64 {
    match temperature {
        Some(t) if t.is_finite() => t.clamp(0.0, 1.0),
        _ => DEFAULT_TEMPERATURE,
    }
}

fn normalize_max_tokens(max_tokens: Option<u64>) -> u32 {
    match max_tokens {
        Some(0) | None => DEFAULT_MAX_TOKENS,
        Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
    }
}
