//! Store Views and Setters
//!
//! [`StoreView`] is the read side: every read made inside a computation
//! subscribes to exactly the property it touched. [`SetStore`] is the only
//! write side.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use super::node::{NodeRef, Property, Slot, Track};
use super::path::{Mutation, Path, Setter};
use super::Key;
use crate::error::Result;
use crate::reactive::batch;

/// What a property read returns.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreItem {
    Value(Value),
    View(StoreView),
}

impl StoreItem {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            StoreItem::Value(value) => Some(value),
            StoreItem::View(_) => None,
        }
    }

    pub fn as_view(&self) -> Option<&StoreView> {
        match self {
            StoreItem::View(view) => Some(view),
            StoreItem::Value(_) => None,
        }
    }

    /// The item as plain JSON. Nested views are copied without tracking.
    pub fn into_value(self) -> Value {
        match self {
            StoreItem::Value(value) => value,
            StoreItem::View(view) => view.to_value(),
        }
    }
}

/// Read-only view of one store node.
#[derive(Clone)]
pub struct StoreView {
    node: NodeRef,
}

impl PartialEq for StoreView {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for StoreView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node.borrow();
        f.debug_struct("StoreView")
            .field("store", &node.label())
            .field("list", &node.is_list())
            .field("len", &node.len())
            .finish()
    }
}

impl StoreView {
    pub(crate) fn new(node: NodeRef) -> Self {
        Self { node }
    }

    /// Read a property, subscribing the running computation to it.
    ///
    /// `"length"` on a list reads the length. Returns `None` for a missing
    /// property or a key that does not fit the node.
    pub fn get(&self, key: impl Into<Key>) -> Option<StoreItem> {
        let property = self.node.borrow().resolve(key.into())?;
        let key = match property {
            Property::Length => {
                return Some(StoreItem::Value(Value::from(self.len())));
            }
            Property::Key(key) => key,
        };

        let trigger = self.node.borrow_mut().property_trigger(&key);
        if let Some(trigger) = trigger {
            trigger.track();
        }

        let node = self.node.borrow();
        node.slot(&key).map(|slot| match slot {
            Slot::Leaf(value) => StoreItem::Value(value.clone()),
            Slot::Node(child) => StoreItem::View(StoreView::new(Rc::clone(child))),
        })
    }

    /// Read a property as plain JSON.
    pub fn get_value(&self, key: impl Into<Key>) -> Option<Value> {
        self.get(key).map(StoreItem::into_value)
    }

    /// Follow a sequence of keys, subscribing to every property on the way.
    pub fn at<K: Into<Key>>(&self, keys: impl IntoIterator<Item = K>) -> Option<StoreItem> {
        let mut current = StoreItem::View(self.clone());
        for key in keys {
            current = match current {
                StoreItem::View(view) => view.get(key)?,
                StoreItem::Value(_) => return None,
            };
        }
        Some(current)
    }

    fn track(&self, which: Track) {
        let trigger = self.node.borrow_mut().node_trigger(which);
        if let Some(trigger) = trigger {
            trigger.track();
        }
    }

    /// The node's keys, subscribing to key-set changes.
    pub fn keys(&self) -> Vec<Key> {
        self.track(Track::Keys);
        self.node.borrow().keys()
    }

    /// Number of properties. Lists subscribe to their length, records to
    /// their key set.
    pub fn len(&self) -> usize {
        if self.is_list() {
            self.track(Track::Length);
        } else {
            self.track(Track::Keys);
        }
        self.node.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every property in order, subscribing to the key set and to each
    /// property read.
    pub fn entries(&self) -> Vec<(Key, StoreItem)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(key.clone()).map(|item| (key, item)))
            .collect()
    }

    pub fn is_list(&self) -> bool {
        self.node.borrow().is_list()
    }

    /// Untracked copy of the node as JSON.
    pub fn to_value(&self) -> Value {
        self.node.borrow().to_value()
    }

    /// Views are read-only. Logs a warning and changes nothing.
    pub fn assign(&self, key: impl Into<Key>, value: impl Serialize) {
        let _ = value;
        tracing::warn!(
            store = %self.node.borrow().label(),
            key = %key.into(),
            "cannot assign through a store view; use the store setter"
        );
    }

    /// Views are read-only. Logs a warning and changes nothing.
    pub fn remove(&self, key: impl Into<Key>) {
        tracing::warn!(
            store = %self.node.borrow().label(),
            key = %key.into(),
            "cannot remove through a store view; use the store setter"
        );
    }

    pub(crate) fn node(&self) -> &NodeRef {
        &self.node
    }
}

/// The write side of a store.
#[derive(Clone)]
pub struct SetStore {
    root: NodeRef,
}

impl fmt::Debug for SetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetStore")
            .field("store", &self.root.borrow().label())
            .finish()
    }
}

impl SetStore {
    pub(crate) fn new(root: NodeRef) -> Self {
        Self { root }
    }

    /// Write `value` at `path`. Records written over records are merged.
    pub fn set(&self, path: impl Into<Path>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.apply(path, Setter::Value(value))
    }

    /// Replace the value at `path` with `f(previous)`. Returning `None`
    /// leaves it alone.
    pub fn update(
        &self,
        path: impl Into<Path>,
        f: impl Fn(&Value) -> Option<Value> + 'static,
    ) -> Result<()> {
        self.apply(path, Setter::update(f))
    }

    /// Remove the property at `path`. List items after it shift down.
    pub fn remove(&self, path: impl Into<Path>) -> Result<()> {
        self.apply(path, Setter::Remove)
    }

    /// Apply a setter at `path` as one batch.
    pub fn apply(&self, path: impl Into<Path>, setter: Setter) -> Result<()> {
        let path = path.into();
        batch(|| {
            let mut mutation = Mutation::new(&path, &setter);
            let result = mutation.apply(&self.root);
            tracing::trace!(
                store = %self.root.borrow().label(),
                path = %path,
                notified = mutation.changed.len(),
                retired = mutation.retired.len(),
                "store mutated"
            );
            for trigger in mutation.changed.drain(..) {
                trigger.notify();
            }
            for trigger in mutation.retired.drain(..) {
                trigger.release();
            }
            result
        })
    }
}
