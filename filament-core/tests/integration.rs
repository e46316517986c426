//! Integration Tests for Propagation
//!
//! These tests verify that signals, memos, effects and batches work
//! together: every update is glitch-free and re-runs only what it must.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use filament_core::config::{configure, RuntimeConfig};
use filament_core::error::ReactiveError;
use filament_core::reactive::{
    batch, create_root, create_signal, untrack, Effect, Memo, Owner, Signal,
};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

/// An effect reading two signals written in one batch runs once and sees
/// both new values.
#[test]
fn batched_writes_are_observed_together() {
    let (a, set_a) = create_signal(0);
    let (b, set_b) = create_signal(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&seen);
    Effect::new(move || log.borrow_mut().push((a.get(), b.get())));

    batch(|| {
        set_a.set(1);
        set_b.set(2);
    });

    assert_eq!(*seen.borrow(), vec![(0, 0), (1, 2)]);
}

/// Two memos over one signal never let a shared reader see one fresh and
/// one stale value.
#[test]
fn diamond_dependencies_are_glitch_free() {
    let source = Signal::new(1);
    let doubled = Memo::new(move || source.get() * 2);
    let next = Memo::new(move || source.get() + 1);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&seen);
    Effect::new(move || log.borrow_mut().push((doubled.get(), next.get())));

    source.set(5);

    assert_eq!(*seen.borrow(), vec![(2, 2), (10, 6)]);
    assert_eq!(doubled.run_count(), 2);
    assert_eq!(next.run_count(), 2);
}

/// Writing an unrelated signal never re-runs a computation.
#[test]
fn unrelated_writes_do_not_rerun() {
    let x = Signal::new(0);
    let y = Signal::new(0);
    let runs = counter();

    let count = Rc::clone(&runs);
    Effect::new(move || {
        x.get();
        count.set(count.get() + 1);
    });

    y.set(1);
    y.set(2);
    assert_eq!(runs.get(), 1);

    x.set(1);
    assert_eq!(runs.get(), 2);
}

/// Dependencies are rebuilt on every run: a signal the body stopped
/// reading no longer re-runs it.
#[test]
fn dependencies_follow_the_last_run() {
    let show = Signal::new(true);
    let detail = Signal::new(0);
    let runs = counter();

    let count = Rc::clone(&runs);
    let effect = Effect::new(move || {
        if show.get() {
            detail.get();
        }
        count.set(count.get() + 1);
    });
    assert_eq!(effect.dependency_count(), 2);

    show.set(false);
    assert_eq!(runs.get(), 2);
    assert_eq!(effect.dependency_count(), 1);

    detail.set(1);
    detail.set(2);
    assert_eq!(runs.get(), 2);
}

/// A memo whose output did not change leaves its readers alone.
#[test]
fn unchanged_memo_short_circuits_downstream() {
    let count = Signal::new(0);
    let parity = Memo::new(move || count.get() % 2);
    let runs = counter();

    let effect_runs = Rc::clone(&runs);
    Effect::new(move || {
        parity.get();
        effect_runs.set(effect_runs.get() + 1);
    });

    count.set(2);
    assert_eq!(parity.run_count(), 2);
    assert_eq!(runs.get(), 1);

    count.set(3);
    assert_eq!(runs.get(), 2);
}

/// Memos are lazy: nothing runs until the first read, and a stale memo
/// read outside propagation pulls only what it needs.
#[test]
fn memos_evaluate_on_demand() {
    let count = Signal::new(1);
    let doubled = Memo::new(move || count.get() * 2);
    let quadrupled = Memo::new(move || doubled.get() * 2);
    assert_eq!(doubled.run_count(), 0);

    assert_eq!(quadrupled.get(), 4);
    count.set(2);
    assert_eq!(quadrupled.run_count(), 1);
    assert_eq!(quadrupled.get(), 8);
    assert_eq!(doubled.run_count(), 2);
}

/// Shallow effects run before deeper ones in the same round.
#[test]
fn effects_run_in_depth_order() {
    let source = Signal::new(0);
    let derived = Memo::new(move || source.get() + 1);
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&order);
    Effect::new(move || {
        derived.get();
        source.get();
        log.borrow_mut().push("deep");
    });
    let log = Rc::clone(&order);
    Effect::new(move || {
        source.get();
        log.borrow_mut().push("shallow");
    });

    order.borrow_mut().clear();
    source.set(1);
    assert_eq!(*order.borrow(), vec!["shallow", "deep"]);
}

/// An effect writing its own input is re-run in the next round instead of
/// recursing.
#[test]
fn self_writes_are_deferred_to_the_next_round() {
    let count = Signal::new(0);
    let depth = Rc::new(Cell::new(0usize));
    let max_depth = Rc::new(Cell::new(0usize));

    let (current, deepest) = (Rc::clone(&depth), Rc::clone(&max_depth));
    let effect = Effect::new(move || {
        current.set(current.get() + 1);
        deepest.set(deepest.get().max(current.get()));
        let value = count.get();
        if value < 3 {
            count.set(value + 1);
        }
        current.set(current.get() - 1);
    });

    assert_eq!(count.get_untracked(), 3);
    assert_eq!(effect.run_count(), 4);
    assert_eq!(max_depth.get(), 1);
}

/// Effects that keep re-queueing each other are stopped and reported.
#[test]
fn runaway_propagation_is_reported() {
    configure(RuntimeConfig {
        max_flush_rounds: 10,
        ..RuntimeConfig::default()
    });
    let count = Signal::new(0);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Effect::new(move || {
            let value = count.get();
            count.set(value + 1);
        })
    }));

    let payload = result.expect_err("propagation should not settle");
    let error = payload.downcast::<ReactiveError>().expect("runaway error payload");
    assert!(matches!(*error, ReactiveError::RunawayPropagation(10)));
}

/// Nodes disposed with their owner report stale reads.
#[test]
fn reading_a_disposed_signal_is_an_error() {
    let owner = Owner::new_root();
    let (count, doubled) = owner.run(|| {
        let count = Signal::new(1);
        (count, Memo::new(move || count.get() * 2))
    });
    assert_eq!(doubled.get(), 2);

    owner.dispose();
    assert!(count.is_disposed());
    assert!(matches!(count.try_get(), Err(ReactiveError::StaleRead(id)) if id == count.id()));
    assert!(matches!(doubled.try_get(), Err(ReactiveError::StaleRead(_))));
    assert!(count.try_set(3).is_err());
}

/// A failing memo keeps its last value and its readers wait for the next
/// successful run.
#[test]
fn failures_are_contained_at_the_boundary() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (count, guarded) = create_root(|owner| {
        let sink = Rc::clone(&errors);
        owner.set_error_handler(move |error| sink.borrow_mut().push(error.message().to_string()));

        let count = Signal::new(0);
        let guarded = Memo::new(move || {
            let value = count.get();
            if value == 1 {
                panic!("one is not allowed");
            }
            value * 10
        });
        let log = Rc::clone(&seen);
        Effect::new(move || log.borrow_mut().push(guarded.get()));
        (count, guarded)
    });

    count.set(1);
    assert_eq!(*errors.borrow(), vec!["one is not allowed".to_string()]);
    assert_eq!(*seen.borrow(), vec![0]);
    assert_eq!(guarded.get_untracked(), 0);

    count.set(2);
    assert_eq!(*seen.borrow(), vec![0, 20]);
}

/// With no handler the failure reaches the writer, after the other
/// effects of the round have run.
#[test]
fn unhandled_failures_reach_the_writer() {
    let count = Signal::new(0);
    let sibling = counter();

    Effect::new(move || {
        if count.get() > 0 {
            panic!("effect failed");
        }
    });
    let runs = Rc::clone(&sibling);
    Effect::new(move || {
        count.get();
        runs.set(runs.get() + 1);
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| count.set(1)));
    let payload = result.expect_err("failure should propagate");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"effect failed"));
    assert_eq!(sibling.get(), 2);
}

/// `untrack` reads without subscribing.
#[test]
fn untracked_reads_do_not_subscribe() {
    let tracked = Signal::new(0);
    let ignored = Signal::new(0);
    let runs = counter();

    let count = Rc::clone(&runs);
    Effect::new(move || {
        tracked.get();
        untrack(|| ignored.get());
        count.set(count.get() + 1);
    });

    ignored.set(1);
    assert_eq!(runs.get(), 1);
    tracked.set(1);
    assert_eq!(runs.get(), 2);
}

/// Effects created inside a batch wait for the batch to end.
#[test]
fn effects_created_in_a_batch_start_after_it() {
    let runs = counter();
    let count = Rc::clone(&runs);

    batch(|| {
        Effect::new(move || count.set(count.get() + 1));
        assert_eq!(runs.get(), 0);
    });
    assert_eq!(runs.get(), 1);
}

/// A parent that re-runs disposes its child before the child can run
/// against the write that triggered both.
#[test]
fn stale_children_wait_for_their_parent() {
    let source = Signal::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let generation = counter();

    let log = Rc::clone(&seen);
    let runs = Rc::clone(&generation);
    Effect::new(move || {
        runs.set(runs.get() + 1);
        let current = runs.get();
        let log = Rc::clone(&log);
        Effect::new(move || {
            let value = source.get();
            log.borrow_mut().push(format!("child {current} saw {value}"));
        });
        source.get();
    });

    source.set(1);
    assert_eq!(*seen.borrow(), vec!["child 1 saw 0", "child 2 saw 1"]);
}
