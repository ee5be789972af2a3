//! Runs the starter workflow against an offline provider and prints what a UI
//! would see: each snapshot of the output node and each notification.

use async_trait::async_trait;
use llmflow_rs::ChannelNotifier;
use llmflow_rs::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Answers every prompt by shouting it back after a short pause
struct Shout;

#[async_trait]
impl LlmProvider for Shout {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, prompt: &str, config: &LlmConfig) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(format!("[{}] {}", config.model, prompt.to_uppercase()))
    }
}

#[tokio::main]
async fn main() -> LlmFlowResult<()> {
    let mut graph = WorkflowGraph::initial();
    graph.connect("input-1", "llm-1")?;
    graph.connect("llm-1", "output-1")?;
    graph.update_node_data("input-1", InputData::new("hello, workflow").to_data())?;
    graph.update_node_data(
        "llm-1",
        LlmConfig::new(Provider::OpenAi, "sk-demo")
            .with_model("gpt-3.5-turbo")
            .to_data(),
    )?;

    let (notifier, mut notifications) = ChannelNotifier::new();
    let ctx = WorkflowContext::new(NodeStore::new(graph.nodes.clone()), Arc::new(notifier));
    let executor = WorkflowExecutor::new(ProviderRegistry::new().with(Shout));

    let mut snapshots = ctx.store().subscribe();
    let watcher = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if let Some(output) = first_of_kind(&snapshot, NodeKind::Output) {
                let data = output.output_data();
                println!("snapshot: loading={} value={:?}", data.is_loading, data.value);
            }
        }
    });

    let nodes = executor.trigger(&ctx).await?;
    while let Ok(notification) = notifications.try_recv() {
        println!(
            "notification: [{:?}] {}: {}",
            notification.severity, notification.title, notification.description
        );
    }

    // Second run with a key that cannot belong to OpenAI.
    ctx.store().replace(nodes);
    let mut patch = NodeData::new();
    patch.insert("apiKey".to_string(), JsonValue::from("not-a-key"));
    ctx.store().update(|current| {
        current
            .iter()
            .map(|node| {
                if node.is(NodeKind::Llm) {
                    node.merged(&patch)
                } else {
                    node.clone()
                }
            })
            .collect()
    });
    executor.trigger(&ctx).await?;
    while let Ok(notification) = notifications.try_recv() {
        println!(
            "notification: [{:?}] {}: {}",
            notification.severity, notification.title, notification.description
        );
    }

    println!("final state: {}", ctx.state());
    watcher.abort();
    Ok(())
}
