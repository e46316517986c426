//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running a memo or effect pushes its node;
//! `untrack`, cleanups and error handlers push an untracked entry so reads
//! inside them record nothing. The guard pops on drop, so the stack stays
//! balanced even when a body panics.

use std::cell::RefCell;

use crate::graph::NodeId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<NodeId>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    observer: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given computation.
    pub(crate) fn enter(observer: NodeId) -> Self {
        Self::push(Some(observer))
    }

    /// Enter a context in which reads record no dependency.
    pub(crate) fn untracked() -> Self {
        Self::push(None)
    }

    fn push(observer: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(observer));
        Self { observer }
    }

    /// Whether reads right now would record a dependency.
    pub fn is_tracking() -> bool {
        Self::current_observer().is_some()
    }

    /// The computation that would record a dependency right now, if any.
    pub fn current_observer() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().copied().flatten())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            debug_assert_eq!(
                popped,
                Some(self.observer),
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.observer,
                popped
            );
        });
    }
}

/// Run `f` without recording any dependency for the current computation.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}
