//! Integration Tests for the Reactive Store
//!
//! Reads through views subscribe per property; path writes notify only
//! the properties whose value changed.

use std::cell::Cell;
use std::rc::Rc;

use filament_core::debug::serialize_graph;
use filament_core::error::ReactiveError;
use filament_core::path;
use filament_core::reactive::{batch, Effect, Memo};
use filament_core::store::{create_store, filter, unwrap, PathRange, StoreItem, StoreView};
use serde_json::{json, Value};

fn view(item: Option<StoreItem>) -> StoreView {
    item.and_then(|item| item.as_view().cloned())
        .expect("nested aggregate")
}

/// Count the runs of an effect that reads through `read`.
fn watch(read: impl Fn() + 'static) -> Rc<Cell<usize>> {
    let runs = Rc::new(Cell::new(0));
    let count = Rc::clone(&runs);
    Effect::new(move || {
        read();
        count.set(count.get() + 1);
    });
    runs
}

/// Writing `user.name` merges into the user record and wakes only the
/// readers of `user.name`.
#[test]
fn path_write_notifies_only_the_written_property() {
    let (state, set_state) = create_store(&json!({ "user": { "name": "Amy", "age": 3 } })).unwrap();

    let user = view(state.get("user"));
    let name_reader = user.clone();
    let name_runs = watch(move || {
        name_reader.get("name");
    });
    let age_reader = user.clone();
    let age_runs = watch(move || {
        age_reader.get("age");
    });

    set_state.set(path!["user", "name"], "Bob").unwrap();

    assert_eq!(unwrap(&state), json!({ "user": { "name": "Bob", "age": 3 } }));
    assert_eq!(name_runs.get(), 2);
    assert_eq!(age_runs.get(), 1);
}

/// A record written over a record is merged: untouched properties keep
/// their value and their readers.
#[test]
fn record_writes_merge_shallowly() {
    let (state, set_state) = create_store(&json!({ "user": { "name": "Amy", "age": 3 } })).unwrap();
    let user = view(state.get("user"));

    let reader = user.clone();
    let name_runs = watch(move || {
        reader.get("name");
    });
    let reader = user.clone();
    let age_runs = watch(move || {
        reader.get("age");
    });

    set_state.set(path!["user"], json!({ "age": 4 })).unwrap();

    assert_eq!(unwrap(&state), json!({ "user": { "name": "Amy", "age": 4 } }));
    assert_eq!(view(state.get("user")), user);
    assert_eq!(name_runs.get(), 1);
    assert_eq!(age_runs.get(), 2);
}

/// Flipping `done` on the open items of a list wakes the `done` reader
/// once and leaves the length reader alone.
#[test]
fn filtered_list_write_flips_matching_items() {
    let (state, set_state) = create_store(&json!({ "list": [{ "done": false }] })).unwrap();
    let list = view(state.get("list"));

    let reader = list.clone();
    let done_runs = watch(move || {
        let first = view(reader.get(0usize));
        first.get("done");
    });
    let reader = list.clone();
    let length_runs = watch(move || {
        reader.len();
    });

    set_state
        .set(path!["list", filter(|item, _| item["done"] == false), "done"], true)
        .unwrap();

    assert_eq!(unwrap(&state), json!({ "list": [{ "done": true }] }));
    assert_eq!(done_runs.get(), 2);
    assert_eq!(length_runs.get(), 1);

    // Nothing matches any more.
    set_state
        .set(path!["list", filter(|item, _| item["done"] == false), "done"], true)
        .unwrap();
    assert_eq!(done_runs.get(), 2);
}

/// Appending to a list changes its length and key set.
#[test]
fn appending_wakes_length_readers() {
    let (state, set_state) = create_store(&json!({ "items": [1, 2] })).unwrap();
    let items = view(state.get("items"));

    let reader = items.clone();
    let total = Memo::new(move || {
        reader
            .entries()
            .into_iter()
            .filter_map(|(_, item)| item.as_value().and_then(Value::as_i64))
            .sum::<i64>()
    });
    assert_eq!(total.get(), 3);

    set_state.set(path!["items", 2usize], 4).unwrap();
    assert_eq!(total.get(), 7);
    assert_eq!(items.len(), 3);

    set_state.set(path!["items", 5usize], 1).unwrap();
    assert_eq!(unwrap(&items), json!([1, 2, 4, null, null, 1]));
}

/// Ranges fan a write out over every selected index.
#[test]
fn ranges_write_every_step() {
    let (state, set_state) = create_store(&json!({ "rows": [1, 2, 3, 4, 5] })).unwrap();

    set_state
        .set(
            path!["rows", PathRange { from: Some(1), to: Some(3), by: Some(2) }],
            0,
        )
        .unwrap();
    assert_eq!(state.get_value("rows"), Some(json!([1, 0, 3, 0, 5])));

    set_state
        .update(path!["rows", PathRange::default()], |value| {
            value.as_i64().map(|n| json!(n * 10))
        })
        .unwrap();
    assert_eq!(state.get_value("rows"), Some(json!([10, 0, 30, 0, 50])));
}

/// Several store writes in one batch wake a reader once.
#[test]
fn store_writes_batch_together() {
    let (state, set_state) = create_store(&json!({ "a": 1, "b": 2 })).unwrap();

    let reader = state.clone();
    let runs = watch(move || {
        reader.get("a");
        reader.get("b");
    });

    batch(|| {
        set_state.set(path!["a"], 10).unwrap();
        set_state.set(path!["b"], 20).unwrap();
    });
    assert_eq!(runs.get(), 2);
}

/// Removing a record key wakes the key-set and property readers.
#[test]
fn removing_a_key_wakes_its_readers() {
    let (state, set_state) = create_store(&json!({ "a": 1, "b": 2 })).unwrap();

    let reader = state.clone();
    let keys_runs = watch(move || {
        reader.keys();
    });
    let reader = state.clone();
    let a_runs = watch(move || {
        reader.get("a");
    });

    set_state.remove(path!["a"]).unwrap();
    assert_eq!(unwrap(&state), json!({ "b": 2 }));
    assert_eq!(keys_runs.get(), 2);
    assert_eq!(a_runs.get(), 2);
}

/// A removed key takes its subscription node with it once its readers
/// have been told.
#[test]
fn removed_keys_release_their_triggers() {
    let (state, set_state) = create_store(&json!({ "a": 1, "b": 2 })).unwrap();

    let reader = state.clone();
    let runs = watch(move || {
        for key in reader.keys() {
            reader.get(key);
        }
    });
    let before = serialize_graph().nodes.len();

    set_state.remove(path!["a"]).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(serialize_graph().nodes.len(), before - 1);

    set_state.set(path!["a"], 3).unwrap();
    assert_eq!(runs.get(), 3);
    assert_eq!(serialize_graph().nodes.len(), before);
}

/// A record written over a list updates the indices it names.
#[test]
fn records_merge_into_lists() {
    let (state, set_state) = create_store(&json!({ "rows": ["a", "b"] })).unwrap();
    let rows = view(state.get("rows"));

    let reader = rows.clone();
    let first_runs = watch(move || {
        reader.get(0usize);
    });

    set_state.set(path!["rows"], json!({ "1": "B" })).unwrap();
    assert_eq!(unwrap(&state), json!({ "rows": ["a", "B"] }));
    assert_eq!(view(state.get("rows")), rows);
    assert_eq!(first_runs.get(), 1);
}

/// Paths that do not fit the store's shape are rejected without changing
/// anything.
#[test]
fn invalid_paths_are_errors() {
    let (state, set_state) = create_store(&json!({ "name": "Amy", "tags": ["a"] })).unwrap();

    let err = set_state.set(path!["name", "first"], "A").unwrap_err();
    assert!(matches!(err, ReactiveError::InvalidPath { .. }));
    assert_eq!(
        err.to_string(),
        "invalid store path `name.first`: path descends through a leaf value"
    );

    let err = set_state
        .set(path![filter(|_, _| true), "x"], 1)
        .unwrap_err();
    assert!(matches!(err, ReactiveError::InvalidPath { .. }));

    let err = set_state
        .set(path!["tags", PathRange { from: None, to: None, by: Some(0) }], "b")
        .unwrap_err();
    assert!(matches!(err, ReactiveError::InvalidPath { .. }));

    assert_eq!(unwrap(&state), json!({ "name": "Amy", "tags": ["a"] }));
}
