//! Reactive Primitives
//!
//! Signals, triggers, memos and effects, the ownership tree that scopes
//! them, and the thread-local runtime that connects them.
//!
//! # Concepts
//!
//! ## Signals and Triggers
//!
//! A [`Signal`] holds a value. Reading it inside a running memo or effect
//! records an edge; writing a value that differs by its equality predicate
//! marks everything downstream. A [`Trigger`] is the same without a value:
//! `notify` always marks.
//!
//! ## Memos
//!
//! A [`Memo`] caches a derived value and runs only when read while stale.
//! When its output is unchanged after a re-run, readers that were only
//! `Check` go back to `Clean` without running.
//!
//! ## Effects
//!
//! An [`Effect`] runs at creation and again after every propagation that
//! reaches it, shallowest effects first.
//!
//! ## Owners
//!
//! Every computation has a scope [`Owner`] that is cleaned before each
//! re-run. Disposing an owner disposes its children, runs its cleanups in
//! reverse order and removes the signals and computation it holds. Owners
//! also carry context values and error handlers.
//!
//! ## Batching
//!
//! [`batch`] marks immediately but defers running effects until the
//! outermost batch returns, so a group of writes is observed at once.
//!
//! # Implementation Notes
//!
//! Handles are `Copy` ids into the runtime arena. The runtime never holds
//! a borrow of the graph or the owner map while user code runs; bodies,
//! cleanups and handlers all run with every borrow released.

mod context;
mod effect;
mod memo;
mod owner;
mod runtime;
mod signal;
mod trigger;

pub use context::{untrack, ReactiveContext};
pub use effect::Effect;
pub use memo::Memo;
pub use owner::{
    catch_error, create_root, on_cleanup, provide_context, use_context, Owner, OwnerId,
};
pub use runtime::batch;
pub use signal::{create_signal, ReadSignal, Signal, SignalOptions, WriteSignal};
pub use trigger::Trigger;

pub(crate) use runtime::with_runtime;
