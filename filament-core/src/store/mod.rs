//! Reactive Store
//!
//! A store wraps a JSON-shaped record or list in a tree of nodes with one
//! trigger per property. Reads through a [`StoreView`] subscribe to exactly
//! the properties they touch; writes go through [`SetStore`] with a
//! [`Path`], and only properties whose value really changed notify.
//!
//! # Example
//!
//! ```rust
//! use filament_core::path;
//! use filament_core::reactive::Effect;
//! use filament_core::store::create_store;
//! use serde_json::json;
//!
//! let (state, set_state) = create_store(&json!({ "user": { "name": "Amy", "age": 3 } })).unwrap();
//!
//! let user = state.get("user").and_then(|item| item.as_view().cloned()).unwrap();
//! Effect::new(move || println!("name: {:?}", user.get_value("name")));
//!
//! set_state.set(path!["user", "name"], "Bob").unwrap();
//! assert_eq!(state.to_value(), json!({ "user": { "name": "Bob", "age": 3 } }));
//! ```

mod node;
mod path;
mod view;

use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

pub use node::Key;
pub use path::{filter, Path, PathRange, PathSegment, Setter};
pub use view::{SetStore, StoreItem, StoreView};

use crate::debug::hash_value;
use crate::error::Result;

/// Options for [`create_store_with`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Name used in trigger labels. Defaults to a hash of the initial value.
    pub name: Option<String>,
}

/// Create a store from any value that serializes to a JSON record or list.
pub fn create_store<T: Serialize>(initial: &T) -> Result<(StoreView, SetStore)> {
    create_store_with(initial, StoreOptions::default())
}

/// Like [`create_store`], with options.
pub fn create_store_with<T: Serialize>(
    initial: &T,
    options: StoreOptions,
) -> Result<(StoreView, SetStore)> {
    let value = serde_json::to_value(initial)?;
    let name = match options.name {
        Some(name) => name,
        None => hash_value(&value)?,
    };
    let label: Rc<str> = Rc::from(name);
    let root = path::wrap_root(value, &label)?;
    tracing::debug!(store = %label, "store created");
    Ok((StoreView::new(Rc::clone(&root)), SetStore::new(root)))
}

/// Untracked JSON copy of a store or any view into it.
pub fn unwrap(view: &StoreView) -> Value {
    view.to_value()
}
