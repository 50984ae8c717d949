//! Signal core behavior through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use spark_html::scheduler::{advance, run_until_idle, take_unhandled_rejections};
use spark_html::{AsyncState, Promise, SubscribeMode, await_signal, defer, derived, flatten, signal};

fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    (log, move |value: &T| sink.borrow_mut().push(value.clone()))
}

proptest! {
    #[test]
    fn immediate_subscriber_sees_registration_value_first(
        before in proptest::collection::vec(any::<i32>(), 0..8),
        after in proptest::collection::vec(any::<i32>(), 0..8),
    ) {
        let state = signal(0);
        for value in &before {
            state.set(*value);
        }
        let current = state.peek();

        let (log, listener) = recorder();
        let _sub = state.subscribe(listener, SubscribeMode::Immediate);
        for value in &after {
            state.set(*value);
        }

        let mut expected = vec![current];
        expected.extend(after.iter().copied());
        prop_assert_eq!(log.borrow().clone(), expected);
    }

    #[test]
    fn listeners_run_in_registration_order(count in 1usize..10, writes in 1usize..5) {
        let state = signal(0usize);
        let order = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..count)
            .map(|id| {
                let order = order.clone();
                state.subscribe(move |_| order.borrow_mut().push(id), SubscribeMode::Lazy)
            })
            .collect();
        for n in 0..writes {
            state.set(n);
        }

        let expected: Vec<usize> = (0..writes).flat_map(|_| 0..count).collect();
        prop_assert_eq!(order.borrow().clone(), expected);
        drop(subs);
    }
}

#[test]
fn unsubscribe_is_idempotent() {
    let state = signal(1);
    let (log, listener) = recorder();
    let sub = state.subscribe(listener, SubscribeMode::Lazy);

    state.set(2);
    sub.unsubscribe();
    sub.unsubscribe();
    state.set(3);

    assert_eq!(*log.borrow(), vec![2]);
    assert!(!sub.is_active());
    assert_eq!(state.listener_count(), 0);
}

#[test]
fn derived_recomputes_only_for_tracked_dependencies() {
    let use_left = signal(true);
    let left = signal(1);
    let right = signal(100);
    let runs = Rc::new(Cell::new(0));

    let picked = {
        let (use_left, left, right, runs) = (use_left.clone(), left.clone(), right.clone(), runs.clone());
        derived(move || {
            runs.set(runs.get() + 1);
            if use_left.get() { left.get() } else { right.get() }
        })
    };
    let _sub = picked.subscribe(|_| {}, SubscribeMode::Lazy);
    let baseline = runs.get();

    right.set(101);
    assert_eq!(runs.get(), baseline, "right is not a dependency yet");

    use_left.set(false);
    assert_eq!(picked.get(), 101);
    let switched = runs.get();

    left.set(2);
    assert_eq!(runs.get(), switched, "left was dropped from the dependency set");
    right.set(102);
    assert_eq!(picked.get(), 102);
}

#[test]
fn reentrant_writes_dispatch_depth_first() {
    let a = signal(0);
    let b = signal(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let _first = {
        let (b, log) = (b.clone(), log.clone());
        a.subscribe(
            move |v| {
                log.borrow_mut().push(format!("a1:{v}"));
                b.set(*v * 10);
            },
            SubscribeMode::Lazy,
        )
    };
    let _nested = {
        let log = log.clone();
        b.subscribe(move |v| log.borrow_mut().push(format!("b:{v}")), SubscribeMode::Lazy)
    };
    let _second = {
        let log = log.clone();
        a.subscribe(move |v| log.borrow_mut().push(format!("a2:{v}")), SubscribeMode::Lazy)
    };

    a.set(1);
    assert_eq!(*log.borrow(), vec!["a1:1", "b:10", "a2:1"]);
}

#[test]
fn panicking_listener_does_not_block_later_listeners() {
    let state = signal(0);
    let _bad = state.subscribe(|_| panic!("listener failure"), SubscribeMode::Lazy);
    let (log, listener) = recorder();
    let _good = state.subscribe(listener, SubscribeMode::Lazy);

    state.set(5);
    assert_eq!(*log.borrow(), vec![5]);
}

#[test]
fn flatten_tracks_inner_and_outer() {
    let inner_a = signal("a1".to_string());
    let inner_b = signal("b1".to_string());
    let outer = signal(inner_a.clone());
    let flat = flatten(outer.clone());

    assert_eq!(flat.get(), "a1");
    inner_a.set("a2".into());
    assert_eq!(flat.get(), "a2");
    outer.set(inner_b.clone());
    assert_eq!(flat.get(), "b1");
    inner_b.set("b2".into());
    assert_eq!(flat.get(), "b2");
}

#[test]
fn defer_delivers_only_the_last_value() {
    let query = signal(0);
    let settled = defer(&query, Duration::from_millis(100));
    let (log, listener) = recorder();
    let _sub = settled.subscribe(listener, SubscribeMode::Lazy);

    for n in 1..=3 {
        query.set(n);
        advance(Duration::from_millis(40));
    }
    assert!(log.borrow().is_empty(), "timer resets on every write");
    assert!(settled.is_pending());

    advance(Duration::from_millis(100));
    assert_eq!(*log.borrow(), vec![3]);
    assert_eq!(settled.get(), 3);
}

#[test]
fn superseded_promise_never_overwrites_newer_result() {
    let (first, resolve_first) = Promise::<i32, String>::channel();
    let (second, resolve_second) = Promise::<i32, String>::channel();
    let source = signal(first);
    let state = await_signal(&source);

    source.set(second);
    resolve_second.resolve(2);
    run_until_idle();
    assert_eq!(state.get(), AsyncState::Resolved(2));

    resolve_first.resolve(1);
    run_until_idle();
    assert_eq!(state.get(), AsyncState::Resolved(2), "stale result discarded");
}

#[test]
fn unhandled_rejection_is_queued() {
    let state = spark_html::awaited(Promise::<i32, String>::rejected("offline".into()));
    run_until_idle();
    assert_eq!(state.get(), AsyncState::Rejected("offline".to_string()));
    assert_eq!(take_unhandled_rejections(), vec!["\"offline\"".to_string()]);
}
