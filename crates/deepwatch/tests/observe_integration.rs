#![forbid(unsafe_code)]

//! Integration tests for the public observation API.
//!
//! These tests drive `observe`, `get`, `is` and the hub the way an embedding
//! framework would:
//! - Idempotence and identity round-trips
//! - add / set / delete notifications on facades
//! - Deep propagation and relay to ancestors
//! - Patched hash collections
//! - Listener failures and native rejections

use std::cell::RefCell;
use std::rc::Rc;

use deepwatch::{
    Change, ChangeKind, Key, Listener, Map, ObserveError, ObserveOptions, Object,
    PropertyDescriptor, Registry, Rejection, Set, Value,
};
use tracing::{Level, info};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::TRACE)
        .try_init();
}

type Log = Rc<RefCell<Vec<Change>>>;

fn record(registry: &Registry, handle: &Value) -> (Log, Listener) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let listener = Listener::new(move |change, _| sink.borrow_mut().push(change.clone()));
    registry.get(handle).unwrap().subscribe(&listener);
    (log, listener)
}

fn facade(handle: &Value) -> &Object {
    handle.as_object().expect("keyed containers observe to a facade")
}

#[derive(Debug)]
struct Refused;

impl std::fmt::Display for Refused {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("refused")
    }
}

impl std::error::Error for Refused {}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn observe_is_idempotent() {
    init_tracing();
    let registry = Registry::new();
    let raw = Object::from_entries([("a", 1)]);

    let handle = registry.observe(&raw).unwrap();
    let again = registry.observe(&handle).unwrap();
    let from_raw = registry.observe(&raw).unwrap();

    assert_eq!(handle, again);
    assert_eq!(handle, from_raw);
    // One raw entry plus one facade entry.
    assert_eq!(registry.len(), 2);
    info!(entries = registry.len(), "idempotence holds");
}

#[test]
fn get_round_trips_raw_and_handle() {
    let registry = Registry::new();
    let raw = Object::new();
    let handle = registry.observe(&raw).unwrap();

    let by_raw = registry.get(&Value::from(&raw)).unwrap();
    let by_handle = registry.get(&handle).unwrap();
    assert!(by_raw.ptr_eq(&by_handle));
    assert_eq!(by_handle.target(), Some(Value::from(&raw)));
    assert_eq!(by_handle.handle(), Some(handle.clone()));
}

#[test]
fn get_on_unobserved_fails_loudly() {
    let registry = Registry::new();
    assert!(matches!(
        registry.get(&Value::from(Object::new())),
        Err(ObserveError::NotObserved)
    ));
    assert!(registry.lookup(&Value::from(Object::new())).is_none());
    assert!(!registry.is(&Value::from("text")));
}

#[test]
fn free_functions_use_thread_default() {
    let raw = Object::new();
    let handle = deepwatch::observe(&raw).unwrap();
    assert!(deepwatch::is(&handle));
    assert!(deepwatch::is(&raw));
    assert!(!deepwatch::is(Object::new()));
    assert!(deepwatch::get(&raw).unwrap().ptr_eq(&deepwatch::get(&handle).unwrap()));
    assert!(Registry::current().has(&handle));
    assert!(!Registry::new().has(&handle));
}

// ============================================================================
// Facade notifications
// ============================================================================

#[test]
fn set_notification() {
    let registry = Registry::new();
    let handle = registry
        .observe(Object::from_entries([("key", "value1")]))
        .unwrap();
    let (log, _) = record(&registry, &handle);

    facade(&handle).set("key", "value2").unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    let change = &log[0];
    assert_eq!(change.kind(), ChangeKind::Set);
    assert_eq!(change.property(), Some(&Key::from("key")));
    assert_eq!(change.value(), Some(&Value::from("value2")));
    assert_eq!(change.old(), Some(&Value::from("value1")));
    assert_eq!(change.target(), &handle);
}

#[test]
fn add_notification_has_no_old() {
    let registry = Registry::new();
    let handle = registry.observe(Object::new()).unwrap();
    let (log, _) = record(&registry, &handle);

    facade(&handle).set("fresh", 1).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind(), ChangeKind::Add);
    assert!(log[0].old().is_none());
    assert_eq!(log[0].value(), Some(&Value::from(1)));
}

#[test]
fn delete_notification() {
    let registry = Registry::new();
    let handle = registry.observe(Object::from_entries([("a", 1)])).unwrap();
    let (log, _) = record(&registry, &handle);

    assert!(facade(&handle).delete("a").unwrap());
    assert!(!facade(&handle).delete("missing").unwrap());

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind(), ChangeKind::Delete);
    assert_eq!(log[0].old(), Some(&Value::from(1)));
    assert_eq!(log[0].property(), Some(&Key::from("a")));
    assert!(log[0].value().is_none());
}

#[test]
fn equal_assignment_is_silent() {
    let registry = Registry::new();
    let handle = registry
        .observe(Object::from_entries([("n", 1.0), ("z", 0.0)]))
        .unwrap();
    let (log, _) = record(&registry, &handle);

    facade(&handle).set("n", 1).unwrap();
    facade(&handle).set("z", -0.0).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn nan_over_nan_dispatches_set() {
    let registry = Registry::new();
    let handle = registry
        .observe(Object::from_entries([("n", f64::NAN)]))
        .unwrap();
    let (log, _) = record(&registry, &handle);

    // Strict inequality: NaN differs from itself.
    facade(&handle).set("n", f64::NAN).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind(), ChangeKind::Set);
    assert!(log[0].old().and_then(Value::as_number).is_some_and(f64::is_nan));
    assert!(log[0].value().and_then(Value::as_number).is_some_and(f64::is_nan));
}

#[test]
fn reads_see_through_facade() {
    let registry = Registry::new();
    let raw = Object::from_entries([("a", 1), ("b", 2)]);
    let handle = registry.observe(&raw).unwrap();
    let view = facade(&handle);

    assert_eq!(view.keys(), raw.keys());
    assert_eq!(view.get("b"), Value::from(2));
    view.set("c", 3).unwrap();
    assert_eq!(raw.get("c"), Value::from(3));

    // Raw mutations bypass interception but are visible.
    let (log, _) = record(&registry, &handle);
    raw.set("d", 4).unwrap();
    assert_eq!(view.get("d"), Value::from(4));
    assert!(log.borrow().is_empty());
}

// ============================================================================
// Deep observation
// ============================================================================

#[test]
fn deep_push_reaches_nested_and_root() {
    init_tracing();
    let registry = Registry::new();
    let raw = Object::new().with("sports", Object::from_values(["soccer", "basketball"]));
    let root = registry.observe(&raw).unwrap();
    let sports = facade(&root).get("sports");

    let (root_log, _) = record(&registry, &root);
    let (nested_log, _) = record(&registry, &sports);

    facade(&sports).push("football").unwrap();

    for log in [&root_log, &nested_log] {
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind(), ChangeKind::Add);
        assert_eq!(log[0].property(), Some(&Key::from("2")));
        assert_eq!(log[0].value(), Some(&Value::from("football")));
        assert_eq!(log[0].target(), &sports);
    }
}

#[test]
fn relay_runs_before_local_listeners() {
    let registry = Registry::new();
    let root = registry
        .observe(Object::new().with("child", Object::new()))
        .unwrap();
    let child = facade(&root).get("child");
    let order = Rc::new(RefCell::new(Vec::new()));
    for (handle, tag) in [(&child, "child"), (&root, "root")] {
        let order = Rc::clone(&order);
        registry
            .get(handle)
            .unwrap()
            .subscribe(&Listener::new(move |_, _| order.borrow_mut().push(tag)));
    }

    facade(&child).set("x", 1).unwrap();
    assert_eq!(*order.borrow(), vec!["root", "child"]);
}

#[test]
fn assigned_values_are_observed() {
    let registry = Registry::new();
    let root = registry.observe(Object::new()).unwrap();
    let (log, _) = record(&registry, &root);

    let raw_child = Object::new();
    facade(&root).set("child", &raw_child).unwrap();
    let child = facade(&root).get("child");
    assert!(facade(&child).is_facade());
    assert!(registry.is(&Value::from(&raw_child)));

    facade(&child).set("leaf", true).unwrap();
    let log = log.borrow();
    assert_eq!(log.len(), 2);
    // The add carries the observed handle, not the raw value.
    assert_eq!(log[0].value(), Some(&child));
    assert_eq!(log[1].target(), &child);
}

#[test]
fn ignore_predicate_skips_slots() {
    let registry = Registry::new();
    let options = ObserveOptions::default().with_ignore(|key, _| key.to_string().starts_with('_'));
    let root = registry
        .observe_with(
            Object::new()
                .with("_cache", Object::new())
                .with("state", Object::new()),
            &options,
        )
        .unwrap();

    assert!(!facade(&facade(&root).get("_cache")).is_facade());
    assert!(facade(&facade(&root).get("state")).is_facade());
}

#[test]
fn bulk_array_operations_are_per_slot() {
    let registry = Registry::new();
    let root = registry.observe(Object::from_values([1, 2, 3])).unwrap();
    let (log, _) = record(&registry, &root);

    facade(&root).reverse().unwrap();
    let kinds: Vec<_> = log.borrow().iter().map(Change::kind).collect();
    assert_eq!(kinds, [ChangeKind::Set, ChangeKind::Set]);

    log.borrow_mut().clear();
    facade(&root).splice(0, 2, [9]).unwrap();
    let log = log.borrow();
    assert!(log.len() > 1);
    assert!(log.iter().any(|c| c.kind() == ChangeKind::Delete));
    assert_eq!(
        facade(&root).to_vec().unwrap(),
        vec![Value::from(9), Value::from(1)]
    );
}

#[test]
fn truncate_reports_only_length() {
    let registry = Registry::new();
    let root = registry.observe(Object::from_values(["a", "b"])).unwrap();
    let (log, _) = record(&registry, &root);

    facade(&root).truncate(0).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].property(), Some(&Key::length()));
    assert_eq!(log[0].old(), Some(&Value::from(2)));
    assert_eq!(log[0].value(), Some(&Value::from(0)));
}

// ============================================================================
// Patched collections
// ============================================================================

#[test]
fn set_add_once() {
    let registry = Registry::new();
    let set = Set::new();
    let handle = registry
        .observe_with(&set, &ObserveOptions::patched())
        .unwrap();
    let (log, _) = record(&registry, &handle);

    set.add("x").unwrap();
    set.add("x").unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind(), ChangeKind::Add);
    assert_eq!(log[0].value(), Some(&Value::from("x")));
    assert_eq!(log[0].target(), &Value::from(&set));
}

#[test]
fn map_clear_snapshot() {
    let registry = Registry::new();
    let map = Map::from_entries([("a", 1), ("b", 2)]);
    let handle = registry
        .observe_with(&map, &ObserveOptions::patched())
        .unwrap();
    let (log, _) = record(&registry, &handle);

    map.clear().unwrap();
    map.clear().unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind(), ChangeKind::Clear);
    let snapshot = log[0].old().and_then(Value::as_map).unwrap();
    assert_eq!(
        snapshot.entries(),
        vec![
            (Value::from("a"), Value::from(1)),
            (Value::from("b"), Value::from(2))
        ]
    );
}

#[test]
fn patching_leaves_other_instances_alone() {
    let registry = Registry::new();
    let observed = Set::new();
    registry
        .observe_with(&observed, &ObserveOptions::patched())
        .unwrap();
    let other = Set::new();
    let (log, _) = record(&registry, &Value::from(&observed));

    other.add(Object::new()).unwrap();
    other.clear().unwrap();

    assert!(!other.is_patched());
    assert!(!registry.is(&Value::from(&other)));
    assert!(log.borrow().is_empty());
}

#[test]
fn collections_nested_in_objects_need_patch() {
    let registry = Registry::new();
    let plain = registry
        .observe(Object::new().with("tags", Set::new()))
        .unwrap();
    let tags = facade(&plain).get("tags");
    assert!(!tags.as_set().unwrap().is_patched());

    let patched = registry
        .observe_with(
            Object::new().with("tags", Set::new()),
            &ObserveOptions::patched(),
        )
        .unwrap();
    let (log, _) = record(&registry, &patched);
    let tags = facade(&patched).get("tags");
    tags.as_set().unwrap().add("rust").unwrap();
    assert_eq!(log.borrow().len(), 1);
}

// ============================================================================
// Subscriptions
// ============================================================================

#[test]
fn unsubscribe_stops_only_that_listener() {
    let registry = Registry::new();
    let handle = registry.observe(Object::new()).unwrap();
    let (kept, _) = record(&registry, &handle);
    let (dropped, listener) = record(&registry, &handle);

    facade(&handle).set("a", 1).unwrap();
    registry.get(&handle).unwrap().unsubscribe(&listener);
    facade(&handle).set("b", 2).unwrap();

    assert_eq!(kept.borrow().len(), 2);
    assert_eq!(dropped.borrow().len(), 1);
}

#[test]
fn watch_guard_scopes_listener() {
    let registry = Registry::new();
    let handle = registry.observe(Object::new()).unwrap();
    let count = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&count);
    let guard = registry
        .get(&handle)
        .unwrap()
        .watch(move |_, _| *counter.borrow_mut() += 1);

    facade(&handle).set("a", 1).unwrap();
    drop(guard);
    facade(&handle).set("a", 2).unwrap();
    assert_eq!(*count.borrow(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn listener_failure_is_reported_after_everyone_ran() {
    init_tracing();
    let registry = Registry::new();
    let handle = registry.observe(Object::new()).unwrap();
    let hub = registry.get(&handle).unwrap();
    hub.subscribe(&Listener::fallible(|_, _| Err(Box::new(Refused))));
    let (log, _) = record(&registry, &handle);

    let err = facade(&handle).set("a", 1).unwrap_err();
    match err {
        ObserveError::Dispatch(dispatch) => {
            assert_eq!(dispatch.len(), 1);
            assert_eq!(dispatch.failures()[0].to_string(), "refused");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Applied, and the healthy listener still ran.
    assert_eq!(facade(&handle).get("a"), Value::from(1));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(hub.subscriber_count(), 2);
}

#[test]
fn listener_failure_does_not_cut_array_operations_short() {
    init_tracing();
    let registry = Registry::new();
    let handle = registry.observe(Object::from_values([1, 2, 3, 4])).unwrap();
    registry
        .get(&handle)
        .unwrap()
        .subscribe(&Listener::fallible(|_, _| Err(Box::new(Refused))));
    let (log, _) = record(&registry, &handle);
    let view = facade(&handle);
    let numbers = |arr: &Object| -> Vec<Value> { arr.to_vec().unwrap() };

    match view.reverse() {
        // One failure per swapped slot.
        Err(ObserveError::Dispatch(dispatch)) => assert_eq!(dispatch.len(), 4),
        other => panic!("expected a dispatch error, got {other:?}"),
    }
    assert_eq!(
        numbers(view),
        vec![Value::from(4), Value::from(3), Value::from(2), Value::from(1)]
    );

    assert!(matches!(
        view.splice(0, 1, Vec::<Value>::new()),
        Err(ObserveError::Dispatch(_))
    ));
    assert_eq!(
        numbers(view),
        vec![Value::from(3), Value::from(2), Value::from(1)]
    );
    assert_eq!(view.len(), 3);

    assert!(matches!(view.push(5), Err(ObserveError::Dispatch(_))));
    assert!(matches!(view.shift(), Err(ObserveError::Dispatch(_))));
    assert_eq!(
        numbers(view),
        vec![Value::from(2), Value::from(1), Value::from(5)]
    );
    // The healthy listener saw every slot change.
    assert!(log.borrow().len() > 8);
}

#[test]
fn native_rejections_propagate_without_dispatch() {
    let registry = Registry::new();
    let raw = Object::new();
    raw.define_property(
        "fixed",
        PropertyDescriptor::data(1).with_enumerable(true),
    )
    .unwrap();
    let handle = registry.observe(&raw).unwrap();
    let (log, _) = record(&registry, &handle);

    let view = facade(&handle);
    assert_eq!(
        view.set("fixed", 2).unwrap_err().rejection(),
        Some(Rejection::NonWritable)
    );
    assert_eq!(
        view.delete("fixed").unwrap_err().rejection(),
        Some(Rejection::NonConfigurable)
    );
    view.prevent_extensions();
    assert_eq!(
        view.set("new", 1).unwrap_err().rejection(),
        Some(Rejection::NotExtensible)
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn scalars_and_dates_are_not_observable() {
    let registry = Registry::new();
    for value in [
        Value::Null,
        Value::from(true),
        Value::from(3),
        Value::from("s"),
        Value::from(std::time::SystemTime::UNIX_EPOCH),
    ] {
        assert!(matches!(
            registry.observe(value),
            Err(ObserveError::NotObservable { .. })
        ));
    }
    assert!(matches!(
        registry.observe(Map::new()),
        Err(ObserveError::PatchRequired { kind: "map" })
    ));
}
