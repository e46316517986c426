//! Update Scheduler
//!
//! The scheduler owns every node in the dependency graph and performs the
//! data-structure half of propagation. Running bodies is left to the
//! runtime, which must never hold a borrow of the scheduler across user
//! code.
//!
//! # Algorithm
//!
//! 1. When a source changes, mark its direct dependents `Dirty`.
//! 2. Propagate `Check` to everything reachable beyond them (BFS). States
//!    are only ever raised.
//! 3. Queue every effect reached along the way.
//! 4. The runtime drains the queue in ascending depth order and pulls each
//!    effect's upstream memos before deciding whether the effect re-runs.
//!
//! This "push-pull" approach re-runs exactly the computations whose inputs
//! actually changed.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::{DirtyState, Node, NodeId, NodeKind};

/// The update scheduler manages the dependency graph and the effect queue.
#[derive(Default)]
pub(crate) struct Scheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,

    /// Effects reached by a mark phase and not yet evaluated.
    pending: IndexSet<NodeId>,
}

impl Scheduler {
    /// Create a new empty scheduler.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph along with every edge touching it.
    ///
    /// The node is handed back so the caller can drop it once no borrow of
    /// the scheduler is held; dropping a body may release store nodes that
    /// call back into the graph.
    pub(crate) fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        self.pending.shift_remove(&node_id);
        Some(node)
    }

    pub(crate) fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get a reference to a node.
    pub(crate) fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable reference to a node.
    pub(crate) fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Iterate over every node, in no particular order.
    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Add a dependency edge: `dependent` reads `dependency`.
    ///
    /// Both nodes must still exist; edges to removed nodes are never
    /// recorded, which is what stops a disposed computation from
    /// re-subscribing mid-run.
    pub(crate) fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if dependency == dependent
            || !self.nodes.contains_key(&dependency)
            || !self.nodes.contains_key(&dependent)
        {
            return false;
        }

        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
        true
    }

    /// Drop every dependency edge of `node_id`, ahead of a re-run.
    pub(crate) fn clear_dependencies(&mut self, node_id: NodeId) {
        let dependencies = match self.nodes.get_mut(&node_id) {
            Some(node) => node.take_dependencies(),
            None => return,
        };

        for dep_id in dependencies {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(node_id);
            }
        }
    }

    /// Recompute a computation's depth from its current dependencies.
    pub(crate) fn refresh_depth(&mut self, node_id: NodeId) {
        let depth = match self.nodes.get(&node_id) {
            Some(node) if node.is_computation() => node
                .dependencies()
                .iter()
                .filter_map(|dep| self.nodes.get(dep))
                .map(|dep| dep.depth + 1)
                .max()
                .unwrap_or(1),
            _ => return,
        };

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.depth = depth;
        }
    }

    /// Mark phase: `source` changed.
    ///
    /// Direct dependents become `Dirty`, everything reachable beyond them
    /// at least `Check`. Each reached effect is queued. Returns the number
    /// of computations reached.
    pub(crate) fn mark_changed(&mut self, source: NodeId) -> usize {
        let mut queue: VecDeque<(NodeId, NodeId, DirtyState)> = match self.nodes.get(&source) {
            Some(node) => node
                .dependents()
                .iter()
                .map(|dependent| (source, *dependent, DirtyState::Dirty))
                .collect(),
            None => return 0,
        };

        let mut visited = HashSet::new();
        let mut dangling: SmallVec<[(NodeId, NodeId); 4]> = SmallVec::new();

        while let Some((parent, node_id, state)) = queue.pop_front() {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                dangling.push((parent, node_id));
                continue;
            };

            node.raise(state);
            if !visited.insert(node_id) {
                continue;
            }

            tracing::trace!(node = %node_id, state = ?node.state, "marked");

            if node.kind() == NodeKind::Effect {
                self.pending.insert(node_id);
            }

            for dependent in node.dependents() {
                queue.push_back((node_id, *dependent, DirtyState::Check));
            }
        }

        for (parent, dependent) in dangling {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.remove_dependent(dependent);
            }
        }

        visited.len()
    }

    /// Queue an effect for the next evaluate pass.
    pub(crate) fn schedule(&mut self, node_id: NodeId) {
        if self.nodes.contains_key(&node_id) {
            self.pending.insert(node_id);
        }
    }

    /// Take the queued effects, shallowest first. Ties keep queue order.
    pub(crate) fn take_pending(&mut self) -> Vec<NodeId> {
        let mut effects: Vec<(usize, NodeId)> = self
            .pending
            .drain(..)
            .filter_map(|id| self.nodes.get(&id).map(|node| (node.depth, id)))
            .collect();
        effects.sort_by_key(|(depth, _)| *depth);
        effects.into_iter().map(|(_, id)| id).collect()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Get the total number of nodes in the graph.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::Compute;
    use std::rc::Rc;

    struct Noop;

    impl Compute for Noop {
        fn run(&self) -> bool {
            false
        }
    }

    fn clean(kind: NodeKind) -> Node {
        let mut node = Node::computation(kind, None, Rc::new(Noop));
        node.state = DirtyState::Clean;
        node
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut scheduler = Scheduler::new();

        let id1 = scheduler.add_node(Node::source(None));
        let id2 = scheduler.add_node(clean(NodeKind::Derived));

        assert_eq!(scheduler.node_count(), 2);

        assert!(scheduler.remove_node(id1).is_some());
        assert_eq!(scheduler.node_count(), 1);
        assert!(scheduler.get_node(id1).is_none());
        assert!(scheduler.get_node(id2).is_some());
        assert!(scheduler.remove_node(id1).is_none());
    }

    #[test]
    fn add_and_clear_edges() {
        let mut scheduler = Scheduler::new();

        let source_id = scheduler.add_node(Node::source(None));
        let derived_id = scheduler.add_node(clean(NodeKind::Derived));

        assert!(scheduler.add_edge(source_id, derived_id));
        assert!(scheduler
            .get_node(source_id)
            .unwrap()
            .dependents()
            .contains(&derived_id));

        scheduler.clear_dependencies(derived_id);
        assert!(scheduler.get_node(source_id).unwrap().dependents().is_empty());
        assert!(scheduler
            .get_node(derived_id)
            .unwrap()
            .dependencies()
            .is_empty());
    }

    #[test]
    fn edges_to_removed_nodes_are_refused() {
        let mut scheduler = Scheduler::new();
        let source_id = scheduler.add_node(Node::source(None));
        let effect_id = scheduler.add_node(clean(NodeKind::Effect));
        scheduler.remove_node(effect_id);

        assert!(!scheduler.add_edge(source_id, effect_id));
        assert!(!scheduler.add_edge(source_id, source_id));
    }

    #[test]
    fn mark_changed_marks_direct_dirty_and_transitive_check() {
        let mut scheduler = Scheduler::new();

        // source -> derived1 -> derived2 -> effect
        let source_id = scheduler.add_node(Node::source(None));
        let derived1_id = scheduler.add_node(clean(NodeKind::Derived));
        let derived2_id = scheduler.add_node(clean(NodeKind::Derived));
        let effect_id = scheduler.add_node(clean(NodeKind::Effect));

        scheduler.add_edge(source_id, derived1_id);
        scheduler.add_edge(derived1_id, derived2_id);
        scheduler.add_edge(derived2_id, effect_id);

        assert_eq!(scheduler.mark_changed(source_id), 3);

        let state = |id| scheduler.get_node(id).unwrap().state;
        assert_eq!(state(derived1_id), DirtyState::Dirty);
        assert_eq!(state(derived2_id), DirtyState::Check);
        assert_eq!(state(effect_id), DirtyState::Check);
        assert_eq!(scheduler.take_pending(), vec![effect_id]);
    }

    #[test]
    fn mark_changed_never_downgrades() {
        let mut scheduler = Scheduler::new();

        // source -> derived -> effect, and source -> effect directly
        let source_id = scheduler.add_node(Node::source(None));
        let derived_id = scheduler.add_node(clean(NodeKind::Derived));
        let effect_id = scheduler.add_node(clean(NodeKind::Effect));

        scheduler.add_edge(source_id, derived_id);
        scheduler.add_edge(source_id, effect_id);
        scheduler.add_edge(derived_id, effect_id);

        scheduler.mark_changed(source_id);
        assert_eq!(
            scheduler.get_node(effect_id).unwrap().state,
            DirtyState::Dirty
        );
    }

    #[test]
    fn pending_effects_come_out_shallowest_first() {
        let mut scheduler = Scheduler::new();

        let source_id = scheduler.add_node(Node::source(None));
        let deep_id = scheduler.add_node(clean(NodeKind::Effect));
        let derived_id = scheduler.add_node(clean(NodeKind::Derived));
        let shallow_id = scheduler.add_node(clean(NodeKind::Effect));

        scheduler.add_edge(source_id, derived_id);
        scheduler.add_edge(derived_id, deep_id);
        scheduler.add_edge(source_id, shallow_id);
        scheduler.refresh_depth(derived_id);
        scheduler.refresh_depth(deep_id);
        scheduler.refresh_depth(shallow_id);

        scheduler.schedule(deep_id);
        scheduler.schedule(shallow_id);

        assert_eq!(scheduler.take_pending(), vec![shallow_id, deep_id]);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn removing_a_node_unqueues_it() {
        let mut scheduler = Scheduler::new();
        let effect_id = scheduler.add_node(clean(NodeKind::Effect));
        scheduler.schedule(effect_id);
        scheduler.remove_node(effect_id);
        assert!(scheduler.take_pending().is_empty());
    }
}
