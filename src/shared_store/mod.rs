//! Shared node store for llmflow
//!
//! The editor and the executor communicate through a single node collection.
//! This module provides the snapshot-publishing store that holds it.

pub mod sync;

// Re-export the main types for convenience
pub use sync::{NodeSnapshot, NodeStore};
