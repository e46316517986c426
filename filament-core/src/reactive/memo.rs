//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a direct dependency changes, the memo is marked `Dirty`; when
//!    something further upstream changes it is only marked `Check`.
//!
//! 4. On next access, a `Check` memo first brings its upstream memos up to
//!    date. If none of them produced a new value it becomes `Clean` again
//!    without running.
//!
//! 5. After a re-run, an output equal to the cached value does not disturb
//!    anything downstream.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed (directly or by a scheduled effect)
//!   will recompute
//! - Memos that are never read stay dirty (no wasted work)

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::rc::Rc;

use super::owner::Owner;
use super::runtime::with_runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{Compute, DirtyState, NodeId, NodeKind, NodeValue};

/// The cached value of a memo.
pub(crate) struct MemoCell<T> {
    value: RefCell<Option<T>>,
    equals: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: Debug + 'static> NodeValue for MemoCell<T> {
    fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
        self
    }

    fn describe(&self) -> Option<String> {
        let value = self.value.try_borrow().ok()?;
        value.as_ref().map(|value| format!("{value:?}"))
    }
}

/// Runs the memo function and stores the result if it differs.
struct MemoBody<T, F> {
    cell: Rc<MemoCell<T>>,
    f: F,
}

impl<T, F> Compute for MemoBody<T, F>
where
    F: Fn() -> T,
{
    fn run(&self) -> bool {
        let next = (self.f)();
        let changed = match &*self.cell.value.borrow() {
            Some(previous) => !(self.cell.equals)(previous, &next),
            None => true,
        };
        if changed {
            let previous = self.cell.value.replace(Some(next));
            drop(previous);
        }
        changed
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// Reading a memo from inside its own computation is a cycle and reports
/// [`ReactiveError::Cycle`].
pub struct Memo<T> {
    id: NodeId,
    ty: PhantomData<fn() -> T>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Memo<T> {}

impl<T> PartialEq for Memo<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Memo<T> {}

impl<T> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo").field("id", &self.id).finish()
    }
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self::with_equality(f, |a, b| a == b)
    }

    /// Create a memo under an explicit owner (`None` for a detached memo).
    pub fn new_in(owner: Option<Owner>, f: impl Fn() -> T + 'static) -> Self {
        Self::build(owner, f, Rc::new(|a: &T, b: &T| a == b))
    }
}

impl<T> Memo<T>
where
    T: Clone + Debug + 'static,
{
    /// Create a memo whose outputs are compared with `equals`. Downstream
    /// computations only re-run when `equals` reports a difference.
    pub fn with_equality(
        f: impl Fn() -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        Self::build(Owner::current(), f, Rc::new(equals))
    }

    fn build(
        owner: Option<Owner>,
        f: impl Fn() -> T + 'static,
        equals: Rc<dyn Fn(&T, &T) -> bool>,
    ) -> Self {
        let cell = Rc::new(MemoCell {
            value: RefCell::new(None),
            equals,
        });
        let body = Rc::new(MemoBody {
            cell: Rc::clone(&cell),
            f,
        });
        let value: Rc<dyn NodeValue> = cell;
        let id = with_runtime(|rt| {
            rt.create_computation(
                NodeKind::Derived,
                Some(value),
                body,
                owner.map(|owner| owner.id()),
                None,
            )
        });
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics on a disposed memo, a cycle, or a memo that has never
    /// produced a value. See [`Memo::try_get`].
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|error| panic!("{error}"))
    }

    /// Bring the memo up to date, subscribe the running computation and
    /// return the value.
    pub fn try_get(&self) -> Result<T> {
        self.read(true)
    }

    /// Borrow the current value, recomputing if necessary.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        f(&value)
    }

    /// Get the current value without subscribing. Still recomputes a stale
    /// memo.
    pub fn get_untracked(&self) -> T {
        self.read(false).unwrap_or_else(|error| panic!("{error}"))
    }

    fn read(&self, tracked: bool) -> Result<T> {
        with_runtime(|rt| {
            rt.read_computation(self.id, tracked)?;
            let cell = rt.cell::<MemoCell<T>>(self.id)?;
            let value = cell.value.borrow().clone();
            value.ok_or(ReactiveError::NoValue(self.id))
        })
    }

    /// Get the current dirty state.
    pub fn state(&self) -> Option<DirtyState> {
        with_runtime(|rt| rt.node_state(self.id))
    }

    /// Number of successful runs of the body.
    pub fn run_count(&self) -> usize {
        with_runtime(|rt| rt.node_runs(self.id)).unwrap_or(0)
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        with_runtime(|rt| rt.cell::<MemoCell<T>>(self.id))
            .map(|cell| cell.value.borrow().is_some())
            .unwrap_or(false)
    }

    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_node(self.id));
    }

    pub fn is_disposed(&self) -> bool {
        !with_runtime(|rt| rt.contains(self.id))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
