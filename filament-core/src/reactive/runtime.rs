//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos,
//! effects and owners. It owns the dependency graph and the ownership tree
//! and decides when queued work runs.
//!
//! # How It Works
//!
//! 1. Creating a signal, memo or effect adds a node to the graph. Memos and
//!    effects also get an owner scope.
//!
//! 2. When a computation reads a node, the runtime records the edge.
//!
//! 3. When a source changes, the runtime:
//!    a. Marks direct dependents `Dirty` and everything beyond them `Check`
//!    b. Queues every effect reached
//!    c. Unless a batch is open or a computation is running, drains the
//!       queue shallowest first, pulling stale memos on demand
//!
//! # Re-entrancy
//!
//! The runtime is a thread-local. Its `RefCell`s are only borrowed for
//! short bookkeeping sections and never while user code runs, so bodies,
//! cleanups and error handlers are free to read, write, create and dispose.

use std::any::{Any, TypeId};
use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::owner::{ErrorHandler, OwnerId, OwnerNode};
use crate::config::RuntimeConfig;
use crate::error::{ComputationError, ReactiveError, Result};
use crate::graph::{Compute, DirtyState, Node, NodeId, NodeKind, NodeValue, Scheduler};

type Payload = Box<dyn Any + Send>;

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` against the current thread's runtime.
pub(crate) fn with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> T {
    RUNTIME.with(f)
}

/// Like [`with_runtime`], but returns `None` once the runtime has been torn
/// down at thread exit.
pub(crate) fn try_with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> Option<T> {
    RUNTIME.try_with(f).ok()
}

/// The per-thread reactive runtime.
pub(crate) struct Runtime {
    graph: RefCell<Scheduler>,
    owners: RefCell<HashMap<OwnerId, OwnerNode>>,
    current_owner: Cell<Option<OwnerId>>,

    /// Open `batch` calls.
    batch_depth: Cell<usize>,

    /// Computations whose bodies are on the stack.
    running: Cell<usize>,

    flushing: Cell<bool>,

    /// Failures no handler accepted, re-raised when control returns to the
    /// outermost caller.
    unhandled: RefCell<VecDeque<Payload>>,

    /// Sources dropped while the graph was borrowed.
    released: RefCell<Vec<NodeId>>,
}

/// Restores the previous current owner on drop.
pub(crate) struct OwnerGuard<'a> {
    runtime: &'a Runtime,
    previous: Option<OwnerId>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.runtime.current_owner.set(self.previous);
    }
}

struct FlagGuard<'a>(&'a Cell<bool>);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: RefCell::new(Scheduler::new()),
            owners: RefCell::new(HashMap::new()),
            current_owner: Cell::new(None),
            batch_depth: Cell::new(0),
            running: Cell::new(0),
            flushing: Cell::new(false),
            unhandled: RefCell::new(VecDeque::new()),
            released: RefCell::new(Vec::new()),
        }
    }

    // ----------------------------------------------------------------------
    // Owners
    // ----------------------------------------------------------------------

    pub(crate) fn current_owner(&self) -> Option<OwnerId> {
        self.current_owner.get()
    }

    pub(crate) fn enter_owner(&self, owner: Option<OwnerId>) -> OwnerGuard<'_> {
        let previous = self.current_owner.replace(owner);
        OwnerGuard {
            runtime: self,
            previous,
        }
    }

    pub(crate) fn owner_is_live(&self, id: OwnerId) -> bool {
        self.owners
            .borrow()
            .get(&id)
            .is_some_and(|owner| !owner.disposing)
    }

    pub(crate) fn owner_parent(&self, id: OwnerId) -> Option<OwnerId> {
        self.owners.borrow().get(&id).and_then(|owner| owner.parent)
    }

    fn live_owner(&self, owner: Option<OwnerId>) -> Option<OwnerId> {
        owner.filter(|id| self.owner_is_live(*id))
    }

    /// Create an owner under `parent`. A disposed parent yields a detached
    /// owner.
    pub(crate) fn create_owner(&self, parent: Option<OwnerId>) -> OwnerId {
        let live_parent = self.live_owner(parent);
        if let (Some(parent), None) = (parent, live_parent) {
            tracing::warn!(parent = %parent, "owner created under a disposed parent is detached");
        }

        let id = OwnerId::new();
        let mut owners = self.owners.borrow_mut();
        owners.insert(id, OwnerNode::new(live_parent));
        if let Some(parent) = live_parent.and_then(|parent| owners.get_mut(&parent)) {
            parent.children.push(id);
        }
        tracing::debug!(owner = %id, parent = ?live_parent.map(|p| p.raw()), "owner created");
        id
    }

    pub(crate) fn add_cleanup(&self, owner: OwnerId, cleanup: Box<dyn FnOnce()>) -> bool {
        match self.owners.borrow_mut().get_mut(&owner) {
            Some(node) if !node.disposing => {
                node.cleanups.push(cleanup);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_error_handler(&self, owner: OwnerId, handler: ErrorHandler) {
        let previous = match self.owners.borrow_mut().get_mut(&owner) {
            Some(node) => node.error_handler.replace(handler),
            None => return,
        };
        drop(previous);
    }

    pub(crate) fn provide_context(&self, owner: OwnerId, key: TypeId, value: Rc<dyn Any>) -> bool {
        let previous = match self.owners.borrow_mut().get_mut(&owner) {
            Some(node) => node.contexts.insert(key, value),
            None => return false,
        };
        drop(previous);
        true
    }

    pub(crate) fn lookup_context(&self, start: Option<OwnerId>, key: TypeId) -> Option<Rc<dyn Any>> {
        let owners = self.owners.borrow();
        let mut cursor = start;
        while let Some(id) = cursor {
            let owner = owners.get(&id)?;
            if let Some(value) = owner.contexts.get(&key) {
                return Some(Rc::clone(value));
            }
            cursor = owner.parent;
        }
        None
    }

    /// Dispose an owner and settle whatever the disposal left behind.
    pub(crate) fn dispose_owner(&self, id: OwnerId) {
        self.dispose_owner_inner(id);
        self.settle();
    }

    fn dispose_owner_inner(&self, id: OwnerId) {
        {
            let mut owners = self.owners.borrow_mut();
            match owners.get_mut(&id) {
                Some(owner) if !owner.disposing => owner.disposing = true,
                _ => return,
            }
        }

        tracing::debug!(owner = %id, "disposing owner");
        self.clean_owner(id);

        let Some(owner) = self.owners.borrow_mut().remove(&id) else {
            return;
        };
        if let Some(parent) = owner.parent {
            if let Some(parent) = self.owners.borrow_mut().get_mut(&parent) {
                parent.children.retain(|child| *child != id);
            }
        }
        if let Some(computation) = owner.computation {
            let node = self.graph.borrow_mut().remove_node(computation);
            drop(node);
        }
        drop(owner);
    }

    /// Tear down everything an owner holds while keeping the owner itself.
    ///
    /// Runs before every re-run of a computation on its scope, and as the
    /// first half of disposal.
    fn clean_owner(&self, id: OwnerId) {
        let (children, cleanups, sources, contexts) = {
            let mut owners = self.owners.borrow_mut();
            let Some(owner) = owners.get_mut(&id) else {
                return;
            };
            (
                mem::take(&mut owner.children),
                mem::take(&mut owner.cleanups),
                mem::take(&mut owner.sources),
                mem::take(&mut owner.contexts),
            )
        };

        for child in children.into_iter().rev() {
            self.dispose_owner_inner(child);
        }

        for cleanup in cleanups.into_iter().rev() {
            let outcome = {
                let _ctx = ReactiveContext::untracked();
                panic::catch_unwind(AssertUnwindSafe(cleanup))
            };
            if let Err(payload) = outcome {
                self.handle_error(Some(id), payload, None);
            }
        }

        if !sources.is_empty() {
            let removed: Vec<Node> = {
                let mut graph = self.graph.borrow_mut();
                sources.iter().filter_map(|source| graph.remove_node(*source)).collect()
            };
            drop(removed);
        }
        drop(contexts);
    }

    // ----------------------------------------------------------------------
    // Nodes
    // ----------------------------------------------------------------------

    /// Add a source node. Owned sources are freed with the current owner.
    pub(crate) fn create_source(
        &self,
        value: Option<Rc<dyn NodeValue>>,
        label: Option<String>,
        owned: bool,
    ) -> NodeId {
        let owner = if owned {
            self.live_owner(self.current_owner())
        } else {
            None
        };

        let mut node = Node::source(value);
        node.owner = owner;
        node.label = label;
        let id = self.graph.borrow_mut().add_node(node);

        if let Some(owner) = owner {
            if let Some(node) = self.owners.borrow_mut().get_mut(&owner) {
                node.sources.push(id);
            }
        }
        tracing::trace!(node = %id, "source created");
        id
    }

    /// Add a computation node together with its scope owner.
    pub(crate) fn create_computation(
        &self,
        kind: NodeKind,
        value: Option<Rc<dyn NodeValue>>,
        compute: Rc<dyn Compute>,
        parent: Option<OwnerId>,
        label: Option<String>,
    ) -> NodeId {
        if parent.is_none() && RuntimeConfig::current().warn_unowned {
            tracing::warn!(?kind, "computation created outside an owner will never be disposed");
        }

        let scope = self.create_owner(parent);
        let mut node = Node::computation(kind, value, compute);
        node.owner = self.owner_parent(scope);
        node.scope = Some(scope);
        node.label = label;
        let id = self.graph.borrow_mut().add_node(node);

        if let Some(owner) = self.owners.borrow_mut().get_mut(&scope) {
            owner.computation = Some(id);
        }
        tracing::trace!(node = %id, ?kind, "computation created");
        id
    }

    /// The typed cell stored on a node.
    pub(crate) fn cell<C: 'static>(&self, id: NodeId) -> Result<Rc<C>> {
        let value = self
            .graph
            .borrow()
            .get_node(id)
            .and_then(|node| node.value.clone())
            .ok_or(ReactiveError::StaleRead(id))?;
        value
            .into_any()
            .downcast::<C>()
            .map_err(|_| ReactiveError::StaleRead(id))
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.graph.borrow().contains(id)
    }

    pub(crate) fn node_state(&self, id: NodeId) -> Option<DirtyState> {
        self.graph.borrow().get_node(id).map(|node| node.state)
    }

    pub(crate) fn node_runs(&self, id: NodeId) -> Option<usize> {
        self.graph.borrow().get_node(id).map(|node| node.runs)
    }

    pub(crate) fn dependency_count(&self, id: NodeId) -> Option<usize> {
        self.graph
            .borrow()
            .get_node(id)
            .map(|node| node.dependencies().len())
    }

    /// Dispose a node: computations go with their scope, sources are
    /// detached from their owner and removed.
    pub(crate) fn dispose_node(&self, id: NodeId) {
        let (scope, owner) = match self.graph.borrow().get_node(id) {
            Some(node) => (node.scope, node.owner),
            None => return,
        };

        if let Some(scope) = scope {
            self.dispose_owner(scope);
            return;
        }

        if let Some(owner) = owner {
            if let Some(node) = self.owners.borrow_mut().get_mut(&owner) {
                node.sources.retain(|source| *source != id);
            }
        }
        let removed = self.graph.borrow_mut().remove_node(id);
        drop(removed);
    }

    /// Remove an unowned source from a `Drop` impl.
    ///
    /// Drops can happen while the graph is borrowed; those removals wait for
    /// the next propagation.
    pub(crate) fn release_source(&self, id: NodeId) {
        match self.graph.try_borrow_mut() {
            Ok(mut graph) => {
                let removed = graph.remove_node(id);
                drop(graph);
                drop(removed);
            }
            Err(_) => self.released.borrow_mut().push(id),
        }
    }

    fn release_deferred(&self) {
        let ids = mem::take(&mut *self.released.borrow_mut());
        if ids.is_empty() {
            return;
        }
        let removed: Vec<Node> = {
            let mut graph = self.graph.borrow_mut();
            ids.into_iter().filter_map(|id| graph.remove_node(id)).collect()
        };
        drop(removed);
    }

    // ----------------------------------------------------------------------
    // Propagation
    // ----------------------------------------------------------------------

    /// Record that the running computation read `source`.
    pub(crate) fn track(&self, source: NodeId) {
        if let Some(observer) = ReactiveContext::current_observer() {
            self.graph.borrow_mut().add_edge(source, observer);
        }
    }

    /// A source changed: mark the graph and settle if nothing defers us.
    pub(crate) fn notify(&self, source: NodeId) {
        self.release_deferred();
        let reached = self.graph.borrow_mut().mark_changed(source);
        tracing::trace!(source = %source, reached, "source changed");
        self.settle();
    }

    /// Bring a memo up to date ahead of a read.
    pub(crate) fn read_computation(&self, id: NodeId, tracked: bool) -> Result<()> {
        {
            let graph = self.graph.borrow();
            let node = graph.get_node(id).ok_or(ReactiveError::StaleRead(id))?;
            if node.running {
                return Err(ReactiveError::Cycle(id));
            }
        }

        self.update_if_necessary(id);
        if tracked {
            self.track(id);
        }
        self.settle();
        Ok(())
    }

    /// Run a freshly created effect, or queue it when a batch is open.
    pub(crate) fn start_effect(&self, id: NodeId) {
        if self.batch_depth.get() > 0 {
            self.graph.borrow_mut().schedule(id);
            return;
        }
        self.run_computation(id);
        self.settle();
    }

    /// Run `f` with propagation deferred until the outermost batch ends.
    pub(crate) fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
        self.batch_depth.set(self.batch_depth.get() + 1);
        let value = {
            let _guard = DepthGuard(&self.batch_depth);
            f()
        };
        self.settle();
        value
    }

    /// Flush queued effects and re-raise the first unhandled failure.
    ///
    /// A no-op while a batch is open, a computation is running or a flush
    /// is already draining the queue; whoever is outermost settles.
    pub(crate) fn settle(&self) {
        if self.batch_depth.get() > 0 || self.running.get() > 0 || self.flushing.get() {
            return;
        }

        self.flush();

        let payload = {
            let mut unhandled = self.unhandled.borrow_mut();
            let first = unhandled.pop_front();
            unhandled.clear();
            first
        };
        if let Some(payload) = payload {
            panic::resume_unwind(payload);
        }
    }

    fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        let _guard = FlagGuard(&self.flushing);
        let limit = RuntimeConfig::current().max_flush_rounds;
        let mut rounds = 0;

        loop {
            self.release_deferred();
            let effects = self.graph.borrow_mut().take_pending();
            if effects.is_empty() {
                break;
            }

            rounds += 1;
            if rounds > limit {
                self.graph.borrow_mut().clear_pending();
                tracing::error!(rounds = limit, "propagation did not settle");
                self.unhandled
                    .borrow_mut()
                    .push_back(Box::new(ReactiveError::RunawayPropagation(limit)));
                break;
            }

            tracing::debug!(round = rounds, effects = effects.len(), "evaluating effects");
            for id in effects {
                for ancestor in self.stale_ancestors(id) {
                    self.update_if_necessary(ancestor);
                }
                self.update_if_necessary(id);
            }
        }
    }

    /// Stale computations that own `id`, outermost first.
    ///
    /// Bringing these up to date first lets a re-running parent dispose a
    /// child before the child runs against state it is about to lose.
    fn stale_ancestors(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let graph = self.graph.borrow();
        let owners = self.owners.borrow();
        let mut stale = SmallVec::new();
        let mut cursor = graph.get_node(id).and_then(|node| node.owner);
        while let Some(owner_id) = cursor {
            let Some(owner) = owners.get(&owner_id) else {
                break;
            };
            if let Some(node) = owner.computation.and_then(|computation| graph.get_node(computation)) {
                if node.state != DirtyState::Clean && !node.running {
                    stale.push(node.id());
                }
            }
            cursor = owner.parent;
        }
        stale.reverse();
        stale
    }

    /// Evaluate one computation against its recorded state.
    ///
    /// `Check` pulls upstream computations first and stops as soon as one of
    /// them changed this node to `Dirty`. A node still `Check` afterwards is
    /// current and downgrades without running, unless an upstream failed,
    /// in which case it stays `Check` for a later cycle.
    pub(crate) fn update_if_necessary(&self, id: NodeId) {
        let upstream: SmallVec<[NodeId; 8]> = {
            let graph = self.graph.borrow();
            let Some(node) = graph.get_node(id) else {
                return;
            };
            if node.running || node.state == DirtyState::Clean {
                return;
            }
            if node.state == DirtyState::Check {
                let mut deps: SmallVec<[(usize, NodeId); 8]> = node
                    .dependencies()
                    .iter()
                    .filter_map(|dep| graph.get_node(*dep))
                    .filter(|dep| dep.is_computation())
                    .map(|dep| (dep.depth, dep.id()))
                    .collect();
                deps.sort_by_key(|(depth, _)| *depth);
                deps.into_iter().map(|(_, dep)| dep).collect()
            } else {
                SmallVec::new()
            }
        };

        let mut blocked = false;
        for dep in upstream {
            self.update_if_necessary(dep);

            let graph = self.graph.borrow();
            match graph.get_node(id) {
                None => return,
                Some(node) if node.state == DirtyState::Dirty => break,
                Some(_) => {}
            }
            blocked |= graph.get_node(dep).is_some_and(|dep| dep.errored);
        }

        let state = match self.graph.borrow().get_node(id) {
            Some(node) => node.state,
            None => return,
        };
        match state {
            DirtyState::Dirty => self.run_computation(id),
            DirtyState::Check if blocked => {
                tracing::trace!(node = %id, "upstream failed, left stale");
            }
            DirtyState::Check => {
                if let Some(node) = self.graph.borrow_mut().get_node_mut(id) {
                    node.state = DirtyState::Clean;
                }
                tracing::trace!(node = %id, "verified clean");
            }
            DirtyState::Clean => {}
        }
    }

    /// Re-run a computation's body and propagate a changed memo value.
    pub(crate) fn run_computation(&self, id: NodeId) {
        let (compute, kind, scope, owner) = {
            let graph = self.graph.borrow();
            let Some(node) = graph.get_node(id) else {
                return;
            };
            let Some(compute) = node.compute.clone() else {
                return;
            };
            (compute, node.kind(), node.scope, node.owner)
        };

        if let Some(scope) = scope {
            self.clean_owner(scope);
        }

        {
            let mut graph = self.graph.borrow_mut();
            graph.clear_dependencies(id);
            let Some(node) = graph.get_node_mut(id) else {
                return;
            };
            // Clean before the body runs: a write to one of its own inputs
            // raises it again and it re-runs in the next round.
            node.state = DirtyState::Clean;
            node.running = true;
        }

        tracing::trace!(node = %id, ?kind, "running");
        self.running.set(self.running.get() + 1);
        let result = {
            let _running = DepthGuard(&self.running);
            let _ctx = ReactiveContext::enter(id);
            let _owner = self.enter_owner(scope);
            panic::catch_unwind(AssertUnwindSafe(|| compute.run()))
        };

        let changed = {
            let mut graph = self.graph.borrow_mut();
            graph.refresh_depth(id);
            match graph.get_node_mut(id) {
                Some(node) => {
                    node.running = false;
                    node.errored = result.is_err();
                    if result.is_ok() {
                        node.runs += 1;
                    }
                    kind == NodeKind::Derived && matches!(result, Ok(true))
                }
                None => false,
            }
        };

        if changed {
            let reached = self.graph.borrow_mut().mark_changed(id);
            tracing::trace!(node = %id, reached, "memo changed");
        }

        if let Err(payload) = result {
            let start = scope.filter(|scope| self.owners.borrow().contains_key(scope)).or(owner);
            self.handle_error(start, payload, Some(id));
        }
        drop(compute);
    }

    /// Deliver a failure to the nearest error handler at or above `start`.
    ///
    /// A handler that panics forwards its own failure to the next handler
    /// up. With no handler left the payload is kept for `settle`.
    pub(crate) fn handle_error(&self, start: Option<OwnerId>, payload: Payload, node: Option<NodeId>) {
        let mut payload = payload;
        let mut cursor = start;

        loop {
            let error = ComputationError::from_panic(&*payload, node);
            let Some((owner, handler)) = self.find_handler(cursor) else {
                tracing::error!(error = %error, "unhandled computation failure");
                self.unhandled.borrow_mut().push_back(payload);
                return;
            };

            tracing::debug!(owner = %owner, error = %error, "delivering failure to handler");
            let outcome = {
                let _ctx = ReactiveContext::untracked();
                panic::catch_unwind(AssertUnwindSafe(|| handler(&error)))
            };
            match outcome {
                Ok(()) => return,
                Err(next) => {
                    payload = next;
                    cursor = self.owner_parent(owner);
                }
            }
        }
    }

    fn find_handler(&self, start: Option<OwnerId>) -> Option<(OwnerId, ErrorHandler)> {
        let owners = self.owners.borrow();
        let mut cursor = start;
        while let Some(id) = cursor {
            let owner = owners.get(&id)?;
            if let Some(handler) = &owner.error_handler {
                return Some((id, Rc::clone(handler)));
            }
            cursor = owner.parent;
        }
        None
    }

    // ----------------------------------------------------------------------
    // Diagnostics
    // ----------------------------------------------------------------------

    pub(crate) fn graph(&self) -> Ref<'_, Scheduler> {
        self.graph.borrow()
    }

    pub(crate) fn owners(&self) -> Ref<'_, HashMap<OwnerId, OwnerNode>> {
        self.owners.borrow()
    }
}

/// Run `f` with propagation deferred until the outermost batch returns.
///
/// Writes inside the batch mark the graph immediately, so reads inside it
/// see new signal values and pull fresh memo values. Effects run once,
/// after `f`, in depth order.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|rt| rt.batch(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Memo, Owner, Signal};
    use std::cell::Cell;

    #[test]
    fn signal_write_runs_dependent_effect() {
        let signal = Signal::new(1);
        let seen = Rc::new(Cell::new(0));

        let sink = Rc::clone(&seen);
        Effect::new(move || sink.set(signal.get()));
        assert_eq!(seen.get(), 1);

        signal.set(5);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn batch_defers_effects_until_the_outermost_batch() {
        let signal = Signal::new(0);
        let runs = Rc::new(Cell::new(0));

        let counter = Rc::clone(&runs);
        Effect::new(move || {
            signal.get();
            counter.set(counter.get() + 1);
        });

        batch(|| {
            signal.set(1);
            batch(|| signal.set(2));
            assert_eq!(runs.get(), 1);
        });
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn settled_graph_has_no_pending_work() {
        let signal = Signal::new(1);
        let doubled = Memo::new(move || signal.get() * 2);
        Effect::new(move || {
            doubled.get();
        });

        signal.set(2);
        with_runtime(|rt| assert!(!rt.graph().has_pending()));
    }

    #[test]
    fn disposing_an_owner_removes_its_nodes() {
        let owner = Owner::new_root();
        let (signal, effect) = owner.run(|| {
            let signal = Signal::new(0);
            let effect = Effect::new(move || {
                signal.get();
            });
            (signal, effect)
        });

        let before = with_runtime(|rt| rt.graph().node_count());
        owner.dispose();
        let after = with_runtime(|rt| rt.graph().node_count());

        assert_eq!(before - after, 2);
        assert!(signal.try_get().is_err());
        assert!(effect.is_disposed());
    }

    #[test]
    fn released_sources_wait_for_a_free_graph() {
        let id = with_runtime(|rt| rt.create_source(None, None, false));
        with_runtime(|rt| {
            let _borrow = rt.graph();
            rt.release_source(id);
        });
        assert!(with_runtime(|rt| rt.contains(id)));

        with_runtime(|rt| rt.release_deferred());
        assert!(!with_runtime(|rt| rt.contains(id)));
    }
}
