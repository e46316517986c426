//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies. Inside a batch the first run waits for the
//!    batch to end.
//!
//! 2. When any dependency changes, the effect is queued and re-runs once
//!    the scheduler confirms one of its inputs really changed.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Each effect has its own owner scope. Cleanups registered with
//! [`on_cleanup`](super::on_cleanup) inside the body run before the next
//! run and when the effect is disposed, as do disposals of anything the
//! body created.

use std::cell::RefCell;

use super::owner::Owner;
use super::runtime::with_runtime;
use crate::graph::{Compute, DirtyState, NodeId, NodeKind};

struct EffectBody<F> {
    f: RefCell<F>,
}

impl<F: FnMut()> Compute for EffectBody<F> {
    fn run(&self) -> bool {
        // A running effect is never re-entered, so the borrow is free.
        let mut f = self.f.borrow_mut();
        (&mut *f)();
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", count.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    id: NodeId,
}

impl Effect {
    /// Create a new effect under the current owner.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new(f: impl FnMut() + 'static) -> Self {
        Self::new_in(Owner::current(), f)
    }

    /// Create an effect under an explicit owner (`None` for a detached
    /// effect that only [`Effect::dispose`] removes).
    pub fn new_in(owner: Option<Owner>, f: impl FnMut() + 'static) -> Self {
        let body = std::rc::Rc::new(EffectBody { f: RefCell::new(f) });
        let id = with_runtime(|rt| {
            let id = rt.create_computation(
                NodeKind::Effect,
                None,
                body,
                owner.map(|owner| owner.id()),
                None,
            );
            rt.start_effect(id);
            id
        });
        Self { id }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Number of times the body has completed.
    pub fn run_count(&self) -> usize {
        with_runtime(|rt| rt.node_runs(self.id)).unwrap_or(0)
    }

    /// Number of nodes the last run read.
    pub fn dependency_count(&self) -> usize {
        with_runtime(|rt| rt.dependency_count(self.id)).unwrap_or(0)
    }

    pub fn state(&self) -> Option<DirtyState> {
        with_runtime(|rt| rt.node_state(self.id))
    }

    /// Dispose the effect. Its cleanups run and it never runs again.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_node(self.id));
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !with_runtime(|rt| rt.contains(self.id))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
