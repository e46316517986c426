//! Ownership Tree
//!
//! Owners form a tree that decides when computations, signals and cleanup
//! callbacks are torn down. Every memo and effect gets its own owner scope
//! (a child of the owner that was current when it was created), so anything
//! created while its body runs is disposed before the next run.
//!
//! Disposal is depth-first: children (most recent first), then this owner's
//! cleanups in reverse registration order, then owned signals, then the
//! scoped computation, then detachment from the parent.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::runtime::with_runtime;
use crate::error::ComputationError;
use crate::graph::NodeId;

/// Unique identifier for an owner scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

pub(crate) type ErrorHandler = Rc<dyn Fn(&ComputationError)>;

/// Runtime-side state of an owner.
#[derive(Default)]
pub(crate) struct OwnerNode {
    pub(crate) parent: Option<OwnerId>,
    pub(crate) children: Vec<OwnerId>,
    pub(crate) sources: SmallVec<[NodeId; 4]>,
    pub(crate) computation: Option<NodeId>,
    pub(crate) cleanups: Vec<Box<dyn FnOnce()>>,
    pub(crate) contexts: HashMap<TypeId, Rc<dyn Any>>,
    pub(crate) error_handler: Option<ErrorHandler>,
    pub(crate) disposing: bool,
}

impl OwnerNode {
    pub(crate) fn new(parent: Option<OwnerId>) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }
}

/// Handle to a node of the ownership tree.
///
/// Owners are `Copy` ids into the current thread's runtime. Disposing an
/// owner twice is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    id: OwnerId,
}

impl Owner {
    /// Create an owner scope whose parent is the current owner, if any.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_parent(Self::current())
    }

    /// Create an owner scope under an explicit parent.
    pub fn with_parent(parent: Option<Owner>) -> Self {
        let id = with_runtime(|rt| rt.create_owner(parent.map(|owner| owner.id)));
        Self { id }
    }

    /// Create a detached root owner. Only an explicit `dispose` tears it down.
    pub fn new_root() -> Self {
        Self::with_parent(None)
    }

    pub(crate) fn from_id(id: OwnerId) -> Self {
        Self { id }
    }

    /// The owner that is current on this thread, if any.
    pub fn current() -> Option<Owner> {
        with_runtime(|rt| rt.current_owner()).map(Self::from_id)
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// The parent owner, if this owner is still alive and has one.
    pub fn parent(&self) -> Option<Owner> {
        with_runtime(|rt| rt.owner_parent(self.id)).map(Self::from_id)
    }

    /// Run `f` with this owner as the current owner.
    ///
    /// The previous owner is restored afterwards, also when `f` panics.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        with_runtime(|rt| {
            if !rt.owner_is_live(self.id) {
                tracing::warn!(owner = %self.id, "running inside a disposed owner");
            }
            let _guard = rt.enter_owner(Some(self.id));
            f()
        })
    }

    /// Register a callback to run when this owner is cleaned or disposed.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        let registered = with_runtime(|rt| rt.add_cleanup(self.id, Box::new(f)));
        if !registered {
            tracing::warn!(owner = %self.id, "cleanup registered on a disposed owner is dropped");
        }
    }

    /// Install an error handler. Failures in computations and cleanups
    /// below this owner are delivered to it instead of propagating.
    pub fn set_error_handler(&self, handler: impl Fn(&ComputationError) + 'static) {
        with_runtime(|rt| rt.set_error_handler(self.id, Rc::new(handler)));
    }

    /// Dispose this owner and everything below it.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_owner(self.id));
    }

    /// Whether this owner has been disposed (or is being disposed).
    pub fn is_disposed(&self) -> bool {
        with_runtime(|rt| !rt.owner_is_live(self.id))
    }
}

/// Run `f` under a fresh root owner, handing it the owner so the caller can
/// dispose the whole tree later.
pub fn create_root<T>(f: impl FnOnce(Owner) -> T) -> T {
    let owner = Owner::new_root();
    owner.run(|| f(owner))
}

/// Register a cleanup on the current owner.
///
/// Outside of any owner the callback can never run, so it is dropped.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    match Owner::current() {
        Some(owner) => owner.on_cleanup(f),
        None => {
            if crate::config::RuntimeConfig::current().warn_unowned {
                tracing::warn!("cleanup registered outside an owner will never run");
            }
        }
    }
}

/// Store a context value on the current owner. Returns `false` if there
/// is no current owner.
pub fn provide_context<T: Clone + 'static>(value: T) -> bool {
    with_runtime(|rt| match rt.current_owner() {
        Some(owner) => rt.provide_context(owner, TypeId::of::<T>(), Rc::new(value)),
        None => false,
    })
}

/// Look up the nearest context value of type `T`, walking up the owners.
pub fn use_context<T: Clone + 'static>() -> Option<T> {
    let value = with_runtime(|rt| rt.lookup_context(rt.current_owner(), TypeId::of::<T>()))?;
    value.downcast_ref::<T>().cloned()
}

/// Run `f` under a new owner whose error handler is `handler`.
///
/// Failures in computations created by `f` (now or on later re-runs) go to
/// `handler`. If `f` itself panics, `handler` receives that too and `None`
/// is returned. A failure no handler takes is re-raised to the caller, as
/// it would be from a signal write.
pub fn catch_error<T>(
    f: impl FnOnce() -> T,
    handler: impl Fn(&ComputationError) + 'static,
) -> Option<T> {
    let owner = Owner::new();
    let handler: Rc<dyn Fn(&ComputationError)> = Rc::new(handler);
    with_runtime(|rt| rt.set_error_handler(owner.id, Rc::clone(&handler)));

    match owner.run(|| panic::catch_unwind(AssertUnwindSafe(f))) {
        Ok(value) => Some(value),
        Err(payload) => {
            with_runtime(|rt| {
                rt.handle_error(Some(owner.id), payload, None);
                rt.settle();
            });
            None
        }
    }
}
