//! # Workflow Execution
//!
//! [`WorkflowExecutor`] runs the Input → LLM → Output pipeline once per call.
//!
//! ## Three-Phase Run
//!
//! 1. **Prep**: locate the first input, LLM and output nodes and validate
//!    them. A failure here notifies once and returns the nodes untouched.
//! 2. **Exec**: publish the collection with the output node marked as
//!    loading, then call the provider adapter.
//! 3. **Post**: write the result (or the error text) into the output node of
//!    the store's current snapshot, notify, and settle the context.
//!
//! ## Guarantees
//!
//! - The caller's collection is never mutated; every change produces a new
//!   snapshot in the context's [`NodeStore`](crate::shared_store::NodeStore).
//! - Edits made to the store while the provider call is pending are kept;
//!   the run only rewrites its output node, found by id.
//! - Only the first output node is ever written.
//! - The loading flag always ends `false`, including when the run future is
//!   dropped mid-call.
//! - Every failure produces exactly one error notification, and every run
//!   settles back on [`ExecutionState::Idle`] with its [`RunOutcome`]
//!   recorded.
//!
//! ```rust
//! # use llmflow_rs::prelude::*;
//! # use async_trait::async_trait;
//! struct Fixed;
//!
//! #[async_trait]
//! impl LlmProvider for Fixed {
//!     fn provider(&self) -> Provider { Provider::OpenAi }
//!     async fn generate(&self, _: &str, _: &LlmConfig) -> Result<String, ProviderError> {
//!         Ok("4".to_string())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut graph = WorkflowGraph::initial();
//! graph.update_node_data("input-1", InputData::new("2+2?").to_data()).unwrap();
//! graph.update_node_data("llm-1", LlmConfig::new(Provider::OpenAi, "sk-test").to_data()).unwrap();
//!
//! let executor = WorkflowExecutor::new(ProviderRegistry::new().with(Fixed));
//! let ctx = WorkflowContext::with_nodes(graph.nodes);
//! let nodes = executor.trigger(&ctx).await.unwrap();
//!
//! let output = first_of_kind(&nodes, NodeKind::Output).unwrap().output_data();
//! assert_eq!(output.value, "Generated Output (via openai):\n\n4");
//! assert!(!output.is_loading);
//! # });
//! ```

mod context;

pub use context::{ExecutionState, RunOutcome, WorkflowContext};

use crate::config::ProviderSettings;
use crate::node::{InputData, LlmConfig, Node, NodeKind, OutputData, first_of_kind};
use crate::notify::Notification;
use crate::provider::{ProviderError, ProviderRegistry};
use crate::shared_store::NodeStore;
use crate::validation::{self, ValidationError};
use crate::{LlmFlowError, LlmFlowResult};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Title of the notification sent after a successful run
pub const SUCCESS_TITLE: &str = "Success";

/// Description of the notification sent after a successful run
pub const SUCCESS_DESCRIPTION: &str = "Workflow executed successfully";

/// Runs workflows against a set of provider adapters
#[derive(Debug, Clone, Default)]
pub struct WorkflowExecutor {
    providers: ProviderRegistry,
}

impl WorkflowExecutor {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Executor with every built-in adapter configured from `settings`
    ///
    /// # Errors
    ///
    /// Returns [`LlmFlowError::ConfigError`] if an HTTP client cannot be built.
    pub fn from_settings(settings: &ProviderSettings) -> LlmFlowResult<Self> {
        Ok(Self::new(ProviderRegistry::from_settings(settings)?))
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Run the workflow held in the context's store.
    ///
    /// This is the "Run" button: while one triggered run is in flight, further
    /// calls are refused.
    ///
    /// # Errors
    ///
    /// Returns [`LlmFlowError::AlreadyRunning`] if another triggered run holds
    /// the processing flag. Workflow failures are not errors; they are
    /// reported through the notifier and the output node.
    pub async fn trigger(&self, ctx: &WorkflowContext) -> LlmFlowResult<Vec<Node>> {
        let _processing = ctx.try_begin().ok_or(LlmFlowError::AlreadyRunning)?;
        let nodes = ctx.store().to_vec();
        Ok(self.run(ctx, nodes).await)
    }

    /// Run the workflow over `nodes` and return the updated collection.
    ///
    /// Once validation passes, `nodes` (with the output marked as loading)
    /// becomes the store's collection and the result is written into the
    /// store's current snapshot; the returned collection is that final
    /// snapshot. On a validation failure `nodes` is returned as given and the
    /// store is left alone.
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self, ctx: &WorkflowContext, nodes: Vec<Node>) -> Vec<Node> {
        info!(nodes = nodes.len(), "workflow run started");
        let run = ctx.begin_run();

        let plan = match RunPlan::prep(&nodes) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "validation failed");
                ctx.set_state(ExecutionState::Failed);
                ctx.notify(Notification::error(err.title(), err.to_string()));
                run.finish(RunOutcome::Rejected(err));
                return nodes;
            }
        };

        ctx.set_state(ExecutionState::Running);
        let result = self.exec(ctx, &plan, &nodes).await;
        let (nodes, outcome) = self.post(ctx, &plan, nodes, result);
        run.finish(outcome);

        info!("workflow run finished");
        nodes
    }

    async fn exec(
        &self,
        ctx: &WorkflowContext,
        plan: &RunPlan,
        nodes: &[Node],
    ) -> Result<String, ProviderError> {
        let guard = match &plan.output {
            Some(id) => {
                ctx.store().replace(with_output(nodes, id, |output| OutputData {
                    is_loading: true,
                    ..output
                }));
                Some(LoadingGuard::new(ctx.store(), id))
            }
            None => {
                warn!("workflow has no output node; result will not be stored");
                None
            }
        };

        debug!(provider = %plan.config.provider, model = %plan.config.model, "calling provider");
        let result = self.providers.generate(&plan.input.value, &plan.config).await;

        if let Some(guard) = guard {
            guard.disarm();
        }
        result
    }

    fn post(
        &self,
        ctx: &WorkflowContext,
        plan: &RunPlan,
        nodes: Vec<Node>,
        result: Result<String, ProviderError>,
    ) -> (Vec<Node>, RunOutcome) {
        let (value, notification, outcome) = match result {
            Ok(text) => (
                format!(
                    "Generated Output (via {}):\n\n{}",
                    plan.config.provider, text
                ),
                Notification::info(SUCCESS_TITLE, SUCCESS_DESCRIPTION),
                RunOutcome::Succeeded,
            ),
            Err(err) => {
                warn!(error = %err, "provider call failed");
                (
                    format!("Error: {err}"),
                    Notification::error(err.title(), err.to_string()),
                    RunOutcome::Failed(err),
                )
            }
        };

        // Final snapshot goes out before anyone is told the run is over.
        let nodes = match &plan.output {
            Some(id) => {
                let mut published = Vec::new();
                ctx.store().update(|current| {
                    published = with_output(current, id, |_| OutputData {
                        value: value.clone(),
                        is_loading: false,
                    });
                    published.clone()
                });
                published
            }
            None => nodes,
        };

        if !outcome.is_success() {
            ctx.set_state(ExecutionState::Failed);
        }
        ctx.notify(notification);
        (nodes, outcome)
    }
}

/// What the prep phase hands to exec
#[derive(Debug)]
struct RunPlan {
    input: InputData,
    config: LlmConfig,
    /// Id of the first output node
    output: Option<String>,
}

impl RunPlan {
    fn prep(nodes: &[Node]) -> Result<Self, ValidationError> {
        let input = first_of_kind(nodes, NodeKind::Input)
            .map(Node::input_data)
            .ok_or(ValidationError::MissingInput)?;
        validation::validate_input(&input)?;

        let config = first_of_kind(nodes, NodeKind::Llm)
            .map(Node::llm_config)
            .ok_or(ValidationError::MissingApiKey)?;
        validation::validate_api_key(&config.api_key, config.provider)?;

        let output = first_of_kind(nodes, NodeKind::Output).map(|node| node.id.clone());
        Ok(Self {
            input,
            config,
            output,
        })
    }
}

/// Copy of `nodes` with `f` applied to the output fields of node `id`.
///
/// Nodes with other ids are cloned unchanged; if `id` is absent nothing is
/// written.
fn with_output<F>(nodes: &[Node], id: &str, f: F) -> Vec<Node>
where
    F: Fn(OutputData) -> OutputData,
{
    nodes
        .iter()
        .map(|node| {
            if node.id == id {
                f(node.output_data()).applied_to(node)
            } else {
                node.clone()
            }
        })
        .collect()
}

/// Clears the output node's loading flag in the store if the run is dropped
/// while the provider call is pending.
struct LoadingGuard {
    store: NodeStore,
    output_id: String,
    armed: bool,
}

impl LoadingGuard {
    fn new(store: &NodeStore, output_id: &str) -> Self {
        Self {
            store: store.clone(),
            output_id: output_id.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(output = %self.output_id, "run cancelled; clearing loading flag");
        let output_id = &self.output_id;
        self.store.update(|current| {
            with_output(current, output_id, |output| OutputData {
                is_loading: false,
                ..output
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(input: &str, key: &str) -> Vec<Node> {
        vec![
            Node::with_data("input-1", NodeKind::Input, InputData::new(input).to_data()),
            Node::with_data(
                "llm-1",
                NodeKind::Llm,
                LlmConfig::new(crate::node::Provider::OpenAi, key).to_data(),
            ),
            Node::new("output-1", NodeKind::Output),
        ]
    }

    #[test]
    fn test_prep_checks_input_before_llm() {
        let mut without_llm = nodes("", "sk-x");
        without_llm.remove(1);
        assert_eq!(
            RunPlan::prep(&without_llm).unwrap_err(),
            ValidationError::MissingInput
        );

        let mut only_input = nodes("hi", "sk-x");
        only_input.truncate(1);
        assert_eq!(
            RunPlan::prep(&only_input).unwrap_err(),
            ValidationError::MissingApiKey
        );

        assert_eq!(
            RunPlan::prep(&[]).unwrap_err(),
            ValidationError::MissingInput
        );
    }

    #[test]
    fn test_prep_checks_key_after_input() {
        assert_eq!(
            RunPlan::prep(&nodes("", "bad")).unwrap_err(),
            ValidationError::MissingInput
        );
        assert_eq!(
            RunPlan::prep(&nodes("hi", "bad")).unwrap_err(),
            ValidationError::MalformedApiKey
        );
        assert!(RunPlan::prep(&nodes("hi", "sk-ok")).is_ok());
    }

    #[test]
    fn test_prep_locates_first_output() {
        let mut all = nodes("hi", "sk-x");
        all.push(Node::new("output-2", NodeKind::Output));

        let plan = RunPlan::prep(&all).unwrap();
        assert_eq!(plan.output.as_deref(), Some("output-1"));
        assert_eq!(plan.input.value, "hi");
    }

    #[test]
    fn test_with_output_touches_only_that_id() {
        let all = nodes("hi", "sk-x");
        let updated = with_output(&all, "output-1", |_| OutputData {
            value: "done".to_string(),
            is_loading: false,
        });

        assert_eq!(updated[0], all[0]);
        assert_eq!(updated[1], all[1]);
        assert_eq!(updated[2].output_data().value, "done");
        assert_eq!(all[2].output_data().value, "");

        assert_eq!(with_output(&all, "missing", |o| o), all);
    }

    #[test]
    fn test_loading_guard_clears_flag_on_drop() {
        let all = nodes("hi", "sk-x");
        let store = NodeStore::new(with_output(&all, "output-1", |_| OutputData {
            value: "previous".to_string(),
            is_loading: true,
        }));

        drop(LoadingGuard::new(&store, "output-1"));

        let output = store.get("output-1").unwrap().output_data();
        assert!(!output.is_loading);
        assert_eq!(output.value, "previous");
    }

    #[test]
    fn test_disarmed_guard_leaves_store_alone() {
        let store = NodeStore::new(nodes("hi", "sk-x"));
        let rx = store.subscribe();

        LoadingGuard::new(&store, "output-1").disarm();
        assert!(!rx.has_changed().unwrap());
    }
}
