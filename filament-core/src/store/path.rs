//! Store Paths
//!
//! A path names the properties a mutation touches. Plain keys descend one
//! level; key lists, filters and ranges fan the rest of the path out over
//! every property they select.
//!
//! ```rust
//! use filament_core::path;
//! use filament_core::store::{filter, PathRange};
//!
//! // list[i].done for every item that is not done yet
//! let open = path!["list", filter(|item, _| item["done"] == false), "done"];
//!
//! // every other row from 2 to 10
//! let rows = path!["rows", PathRange { from: Some(2), to: Some(10), by: Some(2) }];
//! # let _ = (open, rows);
//! ```

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use serde_json::Value;

use super::node::{kind_of, NodeRef, Property, Shape, Slot, StoreNode};
use super::Key;
use crate::error::{ReactiveError, Result};
use crate::reactive::Trigger;

type Predicate = Rc<dyn Fn(&Value, usize) -> bool>;
type Updater = Rc<dyn Fn(&Value) -> Option<Value>>;

/// An index range over a list. `to` is inclusive.
///
/// Defaults: `from = 0`, `to = len - 1`, `by = 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathRange {
    pub from: Option<usize>,
    pub to: Option<usize>,
    pub by: Option<usize>,
}

/// One step of a [`Path`].
#[derive(Clone)]
pub enum PathSegment {
    Key(Key),
    Keys(Vec<Key>),
    Filter(Predicate),
    Range(PathRange),
}

impl fmt::Debug for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.debug_tuple("Key").field(key).finish(),
            PathSegment::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            PathSegment::Filter(_) => f.write_str("Filter(..)"),
            PathSegment::Range(range) => f.debug_tuple("Range").field(range).finish(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Keys(keys) => {
                let keys: Vec<String> = keys.iter().map(Key::to_string).collect();
                write!(f, "[{}]", keys.join(","))
            }
            PathSegment::Filter(_) => f.write_str("[?]"),
            PathSegment::Range(range) => {
                let bound = |value: Option<usize>| value.map(|v| v.to_string()).unwrap_or_default();
                write!(f, "[{}..={};{}]", bound(range.from), bound(range.to), range.by.unwrap_or(1))
            }
        }
    }
}

impl From<Key> for PathSegment {
    fn from(key: Key) -> Self {
        PathSegment::Key(key)
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Key(name.into())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        PathSegment::Key(name.into())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Key(index.into())
    }
}

impl From<PathRange> for PathSegment {
    fn from(range: PathRange) -> Self {
        PathSegment::Range(range)
    }
}

impl From<Vec<Key>> for PathSegment {
    fn from(keys: Vec<Key>) -> Self {
        PathSegment::Keys(keys)
    }
}

impl<K: Into<Key>, const N: usize> From<[K; N]> for PathSegment {
    fn from(keys: [K; N]) -> Self {
        PathSegment::Keys(keys.into_iter().map(Into::into).collect())
    }
}

/// Select the list items for which `predicate(item, index)` holds.
pub fn filter(predicate: impl Fn(&Value, usize) -> bool + 'static) -> PathSegment {
    PathSegment::Filter(Rc::new(predicate))
}

/// A sequence of segments. The empty path is the store root.
#[derive(Debug, Clone, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Append a segment.
    pub fn then(mut self, segment: impl Into<PathSegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl From<&str> for Path {
    fn from(name: &str) -> Self {
        Self::root().then(name)
    }
}

impl From<usize> for Path {
    fn from(index: usize) -> Self {
        Self::root().then(index)
    }
}

impl From<Key> for Path {
    fn from(key: Key) -> Self {
        Self::root().then(key)
    }
}

/// Build a [`Path`] from segments. `path![]` is the root.
#[macro_export]
macro_rules! path {
    () => {
        $crate::store::Path::root()
    };
    ($($segment:expr),+ $(,)?) => {
        $crate::store::Path::from_segments(vec![$($crate::store::PathSegment::from($segment)),+])
    };
}

/// What to do at the end of a path.
#[derive(Clone)]
pub enum Setter {
    /// Write this value (records merge into records).
    Value(Value),
    /// Compute the next value from the previous one. `None` leaves the
    /// property untouched.
    Update(Updater),
    /// Remove the property.
    Remove,
}

impl Setter {
    pub fn update(f: impl Fn(&Value) -> Option<Value> + 'static) -> Self {
        Setter::Update(Rc::new(f))
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setter::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Setter::Update(_) => f.write_str("Update(..)"),
            Setter::Remove => f.write_str("Remove"),
        }
    }
}

/// Applies one mutation to a store tree.
pub(crate) struct Mutation<'a> {
    path: &'a Path,
    setter: &'a Setter,
    pub(crate) changed: IndexSet<Trigger>,
    /// Triggers of removed properties. Released after `changed` fires.
    pub(crate) retired: Vec<Trigger>,
}

impl<'a> Mutation<'a> {
    pub(crate) fn new(path: &'a Path, setter: &'a Setter) -> Self {
        Self {
            path,
            setter,
            changed: IndexSet::new(),
            retired: Vec::new(),
        }
    }

    fn invalid(&self, reason: &'static str) -> ReactiveError {
        ReactiveError::InvalidPath {
            path: self.path.to_string(),
            reason,
        }
    }

    pub(crate) fn apply(&mut self, root: &NodeRef) -> Result<()> {
        let segments = self.path.segments();
        if segments.is_empty() {
            return self.apply_root(root);
        }
        self.descend(root, segments)
    }

    fn apply_root(&mut self, root: &NodeRef) -> Result<()> {
        let next = match self.setter {
            Setter::Value(value) => Some(value.clone()),
            Setter::Update(f) => {
                let previous = root.borrow().to_value();
                f(&previous).filter(|next| *next != previous)
            }
            Setter::Remove => return Err(self.invalid("the store root cannot be removed")),
        };
        match next {
            Some(next) => self.merge(root, next),
            None => Ok(()),
        }
    }

    fn descend(&mut self, node: &NodeRef, segments: &[PathSegment]) -> Result<()> {
        let (segment, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };

        for key in self.expand(node, segment)? {
            if rest.is_empty() {
                self.apply_terminal(node, &key)?;
                continue;
            }

            let child = match node.borrow().slot(&key) {
                Some(Slot::Node(child)) => Rc::clone(child),
                Some(Slot::Leaf(_)) => return Err(self.invalid("path descends through a leaf value")),
                None => return Err(self.invalid("path descends through a missing property")),
            };
            self.descend(&child, rest)?;
        }
        Ok(())
    }

    /// The keys a segment selects on `node`.
    fn expand(&self, node: &NodeRef, segment: &PathSegment) -> Result<Vec<Key>> {
        match segment {
            PathSegment::Key(key) => Ok(vec![self.writable(node, key.clone())?]),
            PathSegment::Keys(keys) => keys
                .iter()
                .map(|key| self.writable(node, key.clone()))
                .collect(),
            PathSegment::Filter(predicate) => {
                let items = match &node.borrow().shape {
                    Shape::List(items) => items.iter().map(Slot::to_value).collect::<Vec<_>>(),
                    Shape::Record(_) => return Err(self.invalid("filters only apply to lists")),
                };
                Ok(items
                    .iter()
                    .enumerate()
                    .filter(|(index, item)| predicate(item, *index))
                    .map(|(index, _)| Key::Index(index))
                    .collect())
            }
            PathSegment::Range(range) => {
                let len = {
                    let node = node.borrow();
                    if !node.is_list() {
                        return Err(self.invalid("ranges only apply to lists"));
                    }
                    node.len()
                };
                let by = range.by.unwrap_or(1);
                if by == 0 {
                    return Err(self.invalid("range step must be positive"));
                }
                let from = range.from.unwrap_or(0);
                let to = match range.to.or_else(|| len.checked_sub(1)) {
                    Some(to) => to,
                    None => return Ok(Vec::new()),
                };
                Ok((from..=to).step_by(by).map(Key::Index).collect())
            }
        }
    }

    fn writable(&self, node: &NodeRef, key: Key) -> Result<Key> {
        match node.borrow().resolve(key) {
            Some(Property::Key(key)) => Ok(key),
            Some(Property::Length) => Err(self.invalid("list length is read-only")),
            None => Err(self.invalid("list properties must be indices")),
        }
    }

    fn apply_terminal(&mut self, node: &NodeRef, key: &Key) -> Result<()> {
        let previous = node.borrow().slot(key).map(|slot| match slot {
            Slot::Leaf(value) => (value.clone(), None),
            Slot::Node(child) => (child.borrow().to_value(), Some(Rc::clone(child))),
        });

        let next = match self.setter {
            Setter::Value(value) => Some(value.clone()),
            Setter::Update(f) => {
                let current = previous.as_ref().map(|(value, _)| value).unwrap_or(&Value::Null);
                match f(current) {
                    Some(next) if next != *current => Some(next),
                    _ => return Ok(()),
                }
            }
            Setter::Remove => {
                let retired = node.borrow_mut().set_property(key, None, &mut self.changed);
                self.retired.extend(retired);
                return Ok(());
            }
        };

        let Some(next) = next else {
            return Ok(());
        };

        if let Some((_, Some(child))) = &previous {
            if next.is_object() {
                return self.merge(child, next);
            }
        }
        node.borrow_mut().set_property(key, Some(next), &mut self.changed);
        Ok(())
    }

    /// Shallow merge: each top-level property of `value` is written on its
    /// own, so untouched properties keep their triggers.
    ///
    /// A record merged into a list writes the indices it names. Every key
    /// is checked before anything is written.
    fn merge(&mut self, node: &NodeRef, value: Value) -> Result<()> {
        let is_list = node.borrow().is_list();
        match (is_list, value) {
            (false, Value::Object(map)) => {
                let mut node = node.borrow_mut();
                for (key, value) in map {
                    node.set_property(&Key::Name(key), Some(value), &mut self.changed);
                }
                Ok(())
            }
            (true, Value::Object(map)) => {
                let writes = map
                    .into_iter()
                    .map(|(key, value)| Ok((self.list_index(node, key)?, value)))
                    .collect::<Result<Vec<_>>>()?;
                let mut node = node.borrow_mut();
                for (key, value) in writes {
                    node.set_property(&key, Some(value), &mut self.changed);
                }
                Ok(())
            }
            (true, Value::Array(items)) => {
                let mut node = node.borrow_mut();
                for (index, value) in items.into_iter().enumerate() {
                    node.set_property(&Key::Index(index), Some(value), &mut self.changed);
                }
                Ok(())
            }
            (_, other) => Err(ReactiveError::NotWrappable(kind_of(&other))),
        }
    }

    fn list_index(&self, node: &NodeRef, key: String) -> Result<Key> {
        match node.borrow().resolve(Key::Name(key)) {
            Some(Property::Key(key)) => Ok(key),
            _ => Err(self.invalid("list properties must be indices")),
        }
    }
}

/// Wrap a JSON value as a fresh store tree.
pub(crate) fn wrap_root(value: Value, label: &Rc<str>) -> Result<NodeRef> {
    StoreNode::wrap(value, label)
}
