//! Store Nodes
//!
//! A store is a tree of nodes. Each node wraps one record or list and keeps
//! the triggers that stand in for its properties. Triggers are created the
//! first time a computation reads the property and are never pre-populated,
//! so an untouched store costs nothing in the graph.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::error::{ReactiveError, Result};
use crate::reactive::{ReactiveContext, Trigger};

pub(crate) type NodeRef = Rc<RefCell<StoreNode>>;

/// A property key: a record field name or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// A key resolved against a concrete node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Property {
    Key(Key),
    /// `"length"` on a list.
    Length,
}

/// What a property holds.
pub(crate) enum Slot {
    Leaf(Value),
    Node(NodeRef),
}

impl Slot {
    pub(crate) fn from_value(value: Value, label: &Rc<str>) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => match StoreNode::wrap(value, label) {
                Ok(node) => Slot::Node(node),
                Err(_) => Slot::Leaf(Value::Null),
            },
            leaf => Slot::Leaf(leaf),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            Slot::Leaf(value) => value.clone(),
            Slot::Node(node) => node.borrow().to_value(),
        }
    }

    fn same_as(&self, value: &Value) -> bool {
        match self {
            Slot::Leaf(leaf) => leaf == value,
            Slot::Node(node) => node.borrow().to_value() == *value,
        }
    }
}

pub(crate) enum Shape {
    Record(IndexMap<String, Slot>),
    List(Vec<Slot>),
}

/// One wrapped record or list.
pub(crate) struct StoreNode {
    pub(crate) shape: Shape,
    properties: HashMap<Key, Trigger>,
    keys: Option<Trigger>,
    length: Option<Trigger>,
    label: Rc<str>,
}

/// Which of a node's triggers to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Track {
    Keys,
    Length,
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

impl StoreNode {
    /// Wrap a JSON record or list. Nested aggregates are wrapped too.
    pub(crate) fn wrap(value: Value, label: &Rc<str>) -> Result<NodeRef> {
        let shape = match value {
            Value::Object(map) => Shape::Record(
                map.into_iter()
                    .map(|(key, value)| (key, Slot::from_value(value, label)))
                    .collect(),
            ),
            Value::Array(items) => Shape::List(
                items
                    .into_iter()
                    .map(|value| Slot::from_value(value, label))
                    .collect(),
            ),
            other => return Err(ReactiveError::NotWrappable(kind_of(&other))),
        };

        Ok(Rc::new(RefCell::new(StoreNode {
            shape,
            properties: HashMap::new(),
            keys: None,
            length: None,
            label: Rc::clone(label),
        })))
    }

    pub(crate) fn is_list(&self) -> bool {
        matches!(self.shape, Shape::List(_))
    }

    pub(crate) fn len(&self) -> usize {
        match &self.shape {
            Shape::Record(map) => map.len(),
            Shape::List(items) => items.len(),
        }
    }

    pub(crate) fn label(&self) -> &Rc<str> {
        &self.label
    }

    /// Resolve a key for this node's shape.
    ///
    /// Records take names (indices become their decimal name); lists take
    /// indices or numeric names, plus the read-only `"length"`.
    pub(crate) fn resolve(&self, key: Key) -> Option<Property> {
        match (&self.shape, key) {
            (Shape::Record(_), Key::Index(index)) => Some(Property::Key(Key::Name(index.to_string()))),
            (Shape::Record(_), key) => Some(Property::Key(key)),
            (Shape::List(_), Key::Index(index)) => Some(Property::Key(Key::Index(index))),
            (Shape::List(_), Key::Name(name)) if name == "length" => Some(Property::Length),
            (Shape::List(_), Key::Name(name)) => name.parse().ok().map(|index| Property::Key(Key::Index(index))),
        }
    }

    pub(crate) fn slot(&self, key: &Key) -> Option<&Slot> {
        match (&self.shape, key) {
            (Shape::Record(map), Key::Name(name)) => map.get(name),
            (Shape::List(items), Key::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    pub(crate) fn keys(&self) -> Vec<Key> {
        match &self.shape {
            Shape::Record(map) => map.keys().cloned().map(Key::Name).collect(),
            Shape::List(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match &self.shape {
            Shape::Record(map) => Value::Object(
                map.iter()
                    .map(|(key, slot)| (key.clone(), slot.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
            Shape::List(items) => Value::Array(items.iter().map(Slot::to_value).collect()),
        }
    }

    /// The property trigger to subscribe to, created when someone is
    /// tracking.
    pub(crate) fn property_trigger(&mut self, key: &Key) -> Option<Trigger> {
        if !ReactiveContext::is_tracking() {
            return None;
        }
        let label = &self.label;
        let trigger = self
            .properties
            .entry(key.clone())
            .or_insert_with(|| Trigger::unowned(Some(format!("{label}.{key}"))));
        Some(*trigger)
    }

    pub(crate) fn node_trigger(&mut self, which: Track) -> Option<Trigger> {
        if !ReactiveContext::is_tracking() {
            return None;
        }
        let name = match which {
            Track::Keys => "_",
            Track::Length => "length",
        };
        let label = format!("{}.{name}", self.label);
        let slot = match which {
            Track::Keys => &mut self.keys,
            Track::Length => &mut self.length,
        };
        Some(*slot.get_or_insert_with(|| Trigger::unowned(Some(label))))
    }

    /// Write one property. `None` removes it.
    ///
    /// Triggers that need to fire are added to `changed`; the caller fires
    /// them once every borrow is released. A removal also detaches the
    /// trigger of the property that no longer exists and returns it, to be
    /// released after it has fired.
    pub(crate) fn set_property(
        &mut self,
        key: &Key,
        value: Option<Value>,
        changed: &mut IndexSet<Trigger>,
    ) -> Option<Trigger> {
        let mut retired = None;
        let label = Rc::clone(&self.label);
        match &mut self.shape {
            Shape::Record(map) => {
                let Key::Name(name) = key else {
                    return None;
                };
                match value {
                    None => {
                        if map.shift_remove(name).is_none() {
                            return None;
                        }
                        self.fire_keys(key, changed);
                        retired = self.properties.remove(key);
                    }
                    Some(value) => {
                        let existed = match map.get(name) {
                            Some(slot) if slot.same_as(&value) => return None,
                            Some(_) => true,
                            None => false,
                        };
                        let previous = map.insert(name.clone(), Slot::from_value(value, &label));
                        drop(previous);
                        if existed {
                            self.fire(key, changed);
                        } else {
                            self.fire_keys(key, changed);
                        }
                    }
                }
            }
            Shape::List(items) => {
                let Key::Index(index) = *key else {
                    return None;
                };
                let before = items.len();
                match value {
                    None => {
                        if index >= before {
                            return None;
                        }
                        let removed = items.remove(index);
                        drop(removed);
                        for shifted in index..before {
                            self.fire(&Key::Index(shifted), changed);
                        }
                        retired = self.properties.remove(&Key::Index(before - 1));
                    }
                    Some(value) => {
                        if items.get(index).is_some_and(|slot| slot.same_as(&value)) {
                            return None;
                        }
                        let slot = Slot::from_value(value, &label);
                        if index < before {
                            let previous = std::mem::replace(&mut items[index], slot);
                            drop(previous);
                            self.fire(key, changed);
                        } else {
                            items.resize_with(index, || Slot::Leaf(Value::Null));
                            items.push(slot);
                            for padded in before..=index {
                                self.fire(&Key::Index(padded), changed);
                            }
                        }
                    }
                }
                if self.len() != before {
                    changed.extend(self.length);
                }
                changed.extend(self.keys);
            }
        }
        retired
    }

    fn fire(&self, key: &Key, changed: &mut IndexSet<Trigger>) {
        changed.extend(self.properties.get(key).copied());
    }

    fn fire_keys(&self, key: &Key, changed: &mut IndexSet<Trigger>) {
        self.fire(key, changed);
        changed.extend(self.keys);
    }

    fn triggers(&self) -> impl Iterator<Item = Trigger> + '_ {
        self.properties
            .values()
            .copied()
            .chain(self.keys)
            .chain(self.length)
    }

    pub(crate) fn trigger_count(&self) -> usize {
        self.triggers().count()
    }
}

impl Drop for StoreNode {
    fn drop(&mut self) {
        for trigger in self.triggers() {
            trigger.release();
        }
    }
}
