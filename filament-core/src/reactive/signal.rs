//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    runtime records an edge from the signal to that computation.
//!
//! 2. When a signal's value changes, every dependent is marked and the
//!    runtime re-evaluates what actually needs it.
//!
//! 3. A write judged equal to the current value does nothing.
//!
//! # Memory Layout
//!
//! A `Signal<T>` is just a node id. The value lives in a [`SignalCell`]
//! attached to the node inside the thread-local runtime, so handles are
//! `Copy` and can be moved into any number of closures.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::rc::Rc;

use super::runtime::with_runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeValue};

type Equals<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Options for [`Signal::with_options`].
pub struct SignalOptions<T> {
    equals: Option<Equals<T>>,
    label: Option<String>,
}

impl<T: PartialEq + 'static> Default for SignalOptions<T> {
    fn default() -> Self {
        Self::with_equals(|a: &T, b: &T| a == b)
    }
}

impl<T: 'static> SignalOptions<T> {
    /// Judge writes with a custom equality predicate.
    pub fn with_equals(equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            equals: Some(Rc::new(equals)),
            label: None,
        }
    }

    /// Notify subscribers on every write, even of an equal value.
    pub fn always_notify() -> Self {
        Self {
            equals: None,
            label: None,
        }
    }

    /// Name the signal in graph snapshots.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Storage for a signal's value.
pub(crate) struct SignalCell<T> {
    value: RefCell<T>,
    equals: Option<Equals<T>>,
}

impl<T: Debug + 'static> NodeValue for SignalCell<T> {
    fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
        self
    }

    fn describe(&self) -> Option<String> {
        self.value.try_borrow().ok().map(|value| format!("{:?}", *value))
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T> {
    id: NodeId,
    ty: PhantomData<fn() -> T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Signal<T> {}

impl<T> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("id", &self.id).finish()
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    /// Create a new signal with the given initial value, owned by the
    /// current owner.
    pub fn new(value: T) -> Self {
        Self::with_options(value, SignalOptions::default())
    }
}

impl<T> Signal<T>
where
    T: Clone + Debug + 'static,
{
    /// Create a signal with a custom equality rule and/or label.
    pub fn with_options(value: T, options: SignalOptions<T>) -> Self {
        let cell: Rc<dyn NodeValue> = Rc::new(SignalCell {
            value: RefCell::new(value),
            equals: options.equals,
        });
        let id = with_runtime(|rt| rt.create_source(Some(cell), options.label, true));
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn cell(&self) -> Result<Rc<SignalCell<T>>> {
        with_runtime(|rt| rt.cell::<SignalCell<T>>(self.id))
    }

    /// Get the current value, subscribing the running computation.
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|error| panic!("{error}"))
    }

    /// Like [`Signal::get`], but reports a disposed signal as an error.
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Borrow the current value, subscribing the running computation.
    ///
    /// `f` must not write this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let cell = self.cell()?;
        with_runtime(|rt| rt.track(self.id));
        let value = cell.value.borrow();
        Ok(f(&*value))
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        match self.cell() {
            Ok(cell) => cell.value.borrow().clone(),
            Err(error) => panic!("{error}"),
        }
    }

    /// Set a new value and notify subscribers.
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed.
    pub fn set(&self, value: T) {
        if let Err(error) = self.try_set(value) {
            panic!("{error}");
        }
    }

    /// Like [`Signal::set`], but reports a disposed signal as an error.
    pub fn try_set(&self, value: T) -> Result<()> {
        let cell = self.cell()?;
        let unchanged = match &cell.equals {
            Some(equals) => equals(&*cell.value.borrow(), &value),
            None => false,
        };
        if unchanged {
            tracing::trace!(node = %self.id, "equal write skipped");
            return Ok(());
        }

        let previous = cell.value.replace(value);
        drop(previous);
        with_runtime(|rt| rt.notify(self.id));
        Ok(())
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if let Err(error) = self.try_update(f) {
            panic!("{error}");
        }
    }

    pub fn try_update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let next = {
            let cell = self.cell()?;
            let current = cell.value.borrow();
            f(&*current)
        };
        self.try_set(next)
    }

    /// Dispose the signal. Later reads report [`ReactiveError::StaleRead`].
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_node(self.id));
    }

    pub fn is_disposed(&self) -> bool {
        !with_runtime(|rt| rt.contains(self.id))
    }

    /// Split into a read half and a write half.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (ReadSignal { inner: self }, WriteSignal { inner: self })
    }
}

/// Read half of a signal created by [`create_signal`].
pub struct ReadSignal<T> {
    inner: Signal<T>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal").field("id", &self.inner.id).finish()
    }
}

impl<T: Clone + Debug + 'static> ReadSignal<T> {
    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn try_get(&self) -> Result<T> {
        self.inner.try_get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }

    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }
}

/// Write half of a signal created by [`create_signal`].
pub struct WriteSignal<T> {
    inner: Signal<T>,
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T> Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal").field("id", &self.inner.id).finish()
    }
}

impl<T: Clone + Debug + 'static> WriteSignal<T> {
    pub fn set(&self, value: T) {
        self.inner.set(value)
    }

    pub fn try_set(&self, value: T) -> Result<()> {
        self.inner.try_set(value)
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.inner.update(f)
    }
}

/// Create a signal and return its read and write halves.
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: Clone + PartialEq + Debug + 'static,
{
    Signal::new(value).split()
}
