//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//! A node is either a source (signal or trigger) or a computation (memo or
//! effect). Computations carry their body as a [`Compute`] trait object so
//! memos and effects share one state machine.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::Serialize;

use crate::reactive::OwnerId;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A source node (signal or trigger). Sources have no dependencies.
    Source,

    /// A derived node (memo). Pure and evaluated on demand.
    Derived,

    /// An effect node. Always scheduled when one of its inputs changes.
    Effect,
}

/// Dirty state of a computation.
///
/// The ordering matters: marking only ever raises a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtyState {
    /// The cached value is up-to-date.
    Clean,

    /// An upstream computation may have changed. Verify before running.
    Check,

    /// A direct dependency changed. The body must re-run.
    Dirty,
}

/// A value held by a graph node, type-erased.
pub(crate) trait NodeValue {
    /// Recover the concrete cell for typed access.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Render the current value for diagnostics.
    fn describe(&self) -> Option<String>;
}

/// The body of a computation.
pub(crate) trait Compute {
    /// Run the body once, returning whether its observable output changed.
    fn run(&self) -> bool;
}

/// A node in the dependency graph.
pub(crate) struct Node {
    id: NodeId,
    kind: NodeKind,
    pub(crate) state: DirtyState,

    /// Topological distance from the sources. Sources sit at depth 0.
    pub(crate) depth: usize,

    pub(crate) value: Option<Rc<dyn NodeValue>>,
    pub(crate) compute: Option<Rc<dyn Compute>>,

    /// Nodes that this node reads from, in first-read order.
    dependencies: IndexSet<NodeId>,

    /// Nodes that read from this node.
    dependents: IndexSet<NodeId>,

    /// Owner whose disposal removes this node.
    pub(crate) owner: Option<OwnerId>,

    /// For computations, the owner scope its body runs in.
    pub(crate) scope: Option<OwnerId>,

    pub(crate) label: Option<String>,
    pub(crate) runs: usize,
    pub(crate) running: bool,
    pub(crate) errored: bool,
}

impl Node {
    /// Create a new source node holding `value`.
    pub(crate) fn source(value: Option<Rc<dyn NodeValue>>) -> Self {
        Self::new(NodeKind::Source, DirtyState::Clean, value, None)
    }

    /// Create a new computation node. Computations start dirty so their
    /// first read or scheduling runs the body.
    pub(crate) fn computation(
        kind: NodeKind,
        value: Option<Rc<dyn NodeValue>>,
        compute: Rc<dyn Compute>,
    ) -> Self {
        Self::new(kind, DirtyState::Dirty, value, Some(compute))
    }

    fn new(
        kind: NodeKind,
        state: DirtyState,
        value: Option<Rc<dyn NodeValue>>,
        compute: Option<Rc<dyn Compute>>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            state,
            depth: 0,
            value,
            compute,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            owner: None,
            scope: None,
            label: None,
            runs: 0,
            running: false,
            errored: false,
        }
    }

    /// Get the node's ID.
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this node has a body to run.
    pub(crate) fn is_computation(&self) -> bool {
        self.kind != NodeKind::Source
    }

    /// Raise the dirty state. Never downgrades.
    pub(crate) fn raise(&mut self, state: DirtyState) {
        if state > self.state {
            self.state = state;
        }
    }

    pub(crate) fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub(crate) fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    pub(crate) fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub(crate) fn take_dependencies(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dependencies)
    }

    pub(crate) fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub(crate) fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    pub(crate) fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("dependencies", &self.dependencies.len())
            .field("dependents", &self.dependents.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Compute for Noop {
        fn run(&self) -> bool {
            false
        }
    }

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn source_node_starts_clean() {
        let node = Node::source(None);
        assert_eq!(node.kind(), NodeKind::Source);
        assert_eq!(node.state, DirtyState::Clean);
        assert!(!node.is_computation());
    }

    #[test]
    fn computation_node_starts_dirty() {
        let node = Node::computation(NodeKind::Derived, None, Rc::new(Noop));
        assert_eq!(node.kind(), NodeKind::Derived);
        assert_eq!(node.state, DirtyState::Dirty);
        assert!(node.is_computation());
    }

    #[test]
    fn raise_never_downgrades() {
        let mut node = Node::computation(NodeKind::Effect, None, Rc::new(Noop));
        node.state = DirtyState::Clean;

        node.raise(DirtyState::Check);
        assert_eq!(node.state, DirtyState::Check);

        node.raise(DirtyState::Dirty);
        assert_eq!(node.state, DirtyState::Dirty);

        node.raise(DirtyState::Check);
        assert_eq!(node.state, DirtyState::Dirty);
    }

    #[test]
    fn dependency_management_keeps_read_order() {
        let mut node = Node::computation(NodeKind::Derived, None, Rc::new(Noop));
        let dep1 = NodeId::new();
        let dep2 = NodeId::new();
        let dep3 = NodeId::new();

        node.add_dependency(dep2);
        node.add_dependency(dep1);
        node.add_dependency(dep3);
        node.add_dependency(dep2);

        let order: Vec<_> = node.dependencies().iter().copied().collect();
        assert_eq!(order, vec![dep2, dep1, dep3]);

        node.remove_dependency(dep1);
        let order: Vec<_> = node.dependencies().iter().copied().collect();
        assert_eq!(order, vec![dep2, dep3]);

        assert_eq!(node.take_dependencies().len(), 2);
        assert!(node.dependencies().is_empty());
    }
}
