use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use llmflow_rs::prelude::*;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the API key when `--api-key` is not given
const ENV_API_KEY: &str = "LLMFLOW_API_KEY";

/// Run Input → LLM → Output workflows from the terminal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the starter workflow (input, LLM and output node) as JSON
    Init {
        /// Destination file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a workflow file and print the output node's value
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to the workflow JSON file
    #[arg(short, long)]
    graph: PathBuf,

    /// Prompt text, replacing the input node's value
    #[arg(short, long)]
    input: Option<String>,

    /// API key, replacing the LLM node's key (falls back to LLMFLOW_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long, value_enum)]
    provider: Option<ProviderCli>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Save the updated workflow back to the graph file
    #[arg(long)]
    write: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderCli {
    Openai,
    Gemini,
}

impl From<ProviderCli> for Provider {
    fn from(value: ProviderCli) -> Self {
        match value {
            ProviderCli::Openai => Provider::OpenAi,
            ProviderCli::Gemini => Provider::Gemini,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Init { output } => init(output),
        Command::Run(args) => run(args).await,
    }
}

fn init(output: Option<PathBuf>) -> Result<ExitCode> {
    let graph = WorkflowGraph::initial();
    match output {
        Some(path) => {
            graph
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote starter workflow");
        }
        None => println!("{}", graph.to_json()?),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut graph = WorkflowGraph::load(&args.graph)
        .with_context(|| format!("loading {}", args.graph.display()))?;
    let env_key = std::env::var(ENV_API_KEY).ok();
    let stashed = apply_overrides(&mut graph, &args, env_key)?;

    let settings = ProviderSettings::from_env()?;
    let executor = WorkflowExecutor::from_settings(&settings)?;
    let ctx = WorkflowContext::with_nodes(graph.nodes.clone());

    let mut nodes = executor.trigger(&ctx).await?;
    match first_of_kind(&nodes, NodeKind::Output) {
        Some(output) => println!("{}", output.output_data().value),
        None => tracing::warn!("workflow has no output node"),
    }

    if args.write {
        if let Some(stashed) = &stashed {
            stashed.restore(&mut nodes);
        }
        graph.nodes = nodes;
        graph
            .save(&args.graph)
            .with_context(|| format!("writing {}", args.graph.display()))?;
    }

    if succeeded(ctx.last_outcome().as_ref()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Only a finished run whose provider answered counts as success
fn succeeded(outcome: Option<&RunOutcome>) -> bool {
    outcome.is_some_and(RunOutcome::is_success)
}

/// The LLM node's `apiKey` as loaded from the file, before a key from the
/// command line or the environment replaced it
#[derive(Debug, Clone, PartialEq)]
struct StashedKey {
    node: String,
    original: Option<Value>,
}

impl StashedKey {
    /// Put the loaded key back so `--write` never persists an override
    fn restore(&self, nodes: &mut [Node]) {
        let Some(node) = nodes.iter_mut().find(|node| node.id == self.node) else {
            return;
        };
        match &self.original {
            Some(key) => {
                node.data.insert("apiKey".to_string(), key.clone());
            }
            None => {
                node.data.remove("apiKey");
            }
        }
    }
}

/// Apply command-line overrides to the loaded graph.
///
/// `--api-key` wins over `env_key`; an empty key counts as unset. Returns the
/// LLM node's original key when a key override was applied.
fn apply_overrides(
    graph: &mut WorkflowGraph,
    args: &RunArgs,
    env_key: Option<String>,
) -> Result<Option<StashedKey>> {
    if let Some(input) = &args.input {
        let id = node_id(graph, NodeKind::Input)?;
        graph.update_node_data(&id, InputData::new(input.as_str()).to_data())?;
    }

    let mut patch = NodeData::new();
    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .or(env_key.filter(|key| !key.is_empty()));
    let overrides_key = api_key.is_some();
    if let Some(key) = api_key {
        patch.insert("apiKey".to_string(), json!(key));
    }
    if let Some(provider) = args.provider {
        patch.insert("provider".to_string(), json!(Provider::from(provider)));
    }
    if let Some(model) = &args.model {
        patch.insert("model".to_string(), json!(model));
    }
    if let Some(temperature) = args.temperature {
        patch.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = args.max_tokens {
        patch.insert("maxTokens".to_string(), json!(max_tokens));
    }

    if patch.is_empty() {
        return Ok(None);
    }

    let id = node_id(graph, NodeKind::Llm)?;
    let stashed = overrides_key.then(|| StashedKey {
        original: graph.node(&id).and_then(|node| node.data.get("apiKey").cloned()),
        node: id.clone(),
    });
    graph.update_node_data(&id, patch)?;
    Ok(stashed)
}

fn node_id(graph: &WorkflowGraph, kind: NodeKind) -> Result<String> {
    first_of_kind(&graph.nodes, kind)
        .map(|node| node.id.clone())
        .with_context(|| format!("workflow has no {kind} node to override"))
}
