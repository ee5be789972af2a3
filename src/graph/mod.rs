//! # Workflow Graph
//!
//! The editor-side view of a workflow: the node collection plus the edges
//! drawn between nodes. Edges are cosmetic. Execution picks nodes by kind,
//! not by following edges, so connecting or removing an edge never changes
//! what a run does.
//!
//! All editing operations follow the same copy-on-write rule as the runtime:
//! a changed node is replaced by a fresh one rather than edited in place.

use crate::node::{Node, NodeData, NodeKind};
use crate::{LlmFlowError, LlmFlowResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A drawn connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("e{source}-{target}"),
            source,
            target,
        }
    }
}

/// Nodes plus edges, as persisted by the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// The graph a new editor session starts with: one input, one LLM and one
    /// output node with default data, and no edges
    pub fn initial() -> Self {
        Self {
            nodes: vec![
                Node::new("input-1", NodeKind::Input),
                Node::new("llm-1", NodeKind::Llm),
                Node::new("output-1", NodeKind::Output),
            ],
            edges: Vec::new(),
        }
    }

    /// Restore the initial graph
    pub fn reset(&mut self) {
        *self = Self::initial();
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Append a node of `kind` with default data and return its id.
    ///
    /// Ids take the form `{kind}-{n}` with the smallest `n` not already used.
    pub fn add_node(&mut self, kind: NodeKind) -> String {
        let id = (1..)
            .map(|n| format!("{kind}-{n}"))
            .find(|candidate| self.node(candidate).is_none())
            .unwrap_or_else(|| format!("{kind}-{}", self.nodes.len() + 1));
        self.nodes.push(Node::new(id.clone(), kind));
        id
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> LlmFlowResult<Node> {
        let index = self.index_of(id)?;
        let removed = self.nodes.remove(index);
        self.edges
            .retain(|edge| edge.source != id && edge.target != id);
        Ok(removed)
    }

    /// Shallow-merge `patch` into a node's data.
    ///
    /// The node is replaced by a merged copy; keys absent from `patch` keep
    /// their values.
    pub fn update_node_data(&mut self, id: &str, patch: NodeData) -> LlmFlowResult<()> {
        let index = self.index_of(id)?;
        self.nodes[index] = self.nodes[index].merged(&patch);
        Ok(())
    }

    /// Draw an edge from `source` to `target`.
    ///
    /// Drawing an edge that already exists is a no-op.
    pub fn connect(&mut self, source: &str, target: &str) -> LlmFlowResult<()> {
        self.index_of(source)?;
        self.index_of(target)?;

        let edge = Edge::new(source, target);
        if !self.edges.iter().any(|existing| existing.id == edge.id) {
            self.edges.push(edge);
        }
        Ok(())
    }

    /// Parse a graph from JSON
    pub fn from_json(json: &str) -> LlmFlowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> LlmFlowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a graph from a JSON file
    pub fn load(path: impl AsRef<Path>) -> LlmFlowResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the graph to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> LlmFlowResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    fn index_of(&self, id: &str) -> LlmFlowResult<usize> {
        self.nodes
            .iter()
            .position(|node| node.id == id)
            .ok_or_else(|| LlmFlowError::NodeNotFound(id.to_string()))
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::initial()
    }
}
