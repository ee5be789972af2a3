use crate::node::{Node, NodeKind, first_of_kind};
use std::sync::Arc;
use tokio::sync::watch;

/// An immutable view of the node collection at one point in time.
pub type NodeSnapshot = Arc<[Node]>;

/// NodeStore holds the node collection shared between the editor and the
/// executor.
///
/// The collection is never mutated in place: every write publishes a whole new
/// snapshot, so readers holding an older [`NodeSnapshot`] never observe a torn
/// intermediate state. Subscribers are woken on every publish, which lets a UI
/// follow the output node's loading flag while a run is in flight.
///
/// Cloning a `NodeStore` yields another handle to the same collection.
#[derive(Debug, Clone)]
pub struct NodeStore {
    sender: Arc<watch::Sender<NodeSnapshot>>,
}

impl NodeStore {
    /// Creates a store holding `nodes`
    pub fn new(nodes: Vec<Node>) -> Self {
        let (sender, _) = watch::channel(NodeSnapshot::from(nodes));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns the current snapshot.
    ///
    /// The snapshot is reference counted; taking one does not copy the nodes.
    pub fn snapshot(&self) -> NodeSnapshot {
        self.sender.borrow().clone()
    }

    /// Returns an owned copy of the current nodes
    pub fn to_vec(&self) -> Vec<Node> {
        self.snapshot().to_vec()
    }

    /// Replaces the whole collection and notifies subscribers
    pub fn replace(&self, nodes: Vec<Node>) {
        self.sender.send_replace(NodeSnapshot::from(nodes));
    }

    /// Publishes a new collection derived from the current one.
    ///
    /// `f` receives the current snapshot and returns the nodes to publish.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&[Node]) -> Vec<Node>,
    {
        self.sender.send_modify(|current| {
            let next = f(current);
            *current = NodeSnapshot::from(next);
        });
    }

    /// Subscribes to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<NodeSnapshot> {
        self.sender.subscribe()
    }

    /// Returns a copy of the node with the given id
    pub fn get(&self, id: &str) -> Option<Node> {
        self.sender.borrow().iter().find(|node| node.id == id).cloned()
    }

    /// Returns a copy of the first node of `kind`
    pub fn first_of_kind(&self, kind: NodeKind) -> Option<Node> {
        first_of_kind(&self.sender.borrow(), kind).cloned()
    }

    /// Gets the number of nodes
    pub fn len(&self) -> usize {
        self.sender.borrow().len()
    }

    /// Checks if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.sender.borrow().is_empty()
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
