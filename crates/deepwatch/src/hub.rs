#![forbid(unsafe_code)]

//! Per-value notification hub.
//!
//! # Design
//!
//! A [`Hub`] is created once per observed value and shared (via `Rc`) by the
//! registry, the facade or patched collection, and any child that relays
//! changes to it. It holds only a weak reference to the observed value, so
//! it never keeps that value alive.
//!
//! Listeners come in two flavours:
//!
//! - [`Hub::subscribe`] stores a [`Listener`] strongly until
//!   [`Hub::unsubscribe`] is called with the same listener.
//! - [`Hub::watch`] stores the callback weakly and returns a
//!   [`Subscription`] guard; dropping the guard unsubscribes.
//!
//! # Invariants
//!
//! 1. A listener is registered at most once (identity by `Rc` pointer).
//! 2. Listeners run in registration order.
//! 3. A dispatch pass snapshots the listener list first: each listener
//!    present at the start runs exactly once; listeners added during the
//!    pass first run on the next dispatch.
//! 4. A failing listener never stops the others.
//!
//! # Failure Modes
//!
//! - **Listener failure**: logged with `warn!`, collected, and returned as
//!   a [`DispatchError`] after every listener ran.
//! - **Self-referencing listener**: a listener passed to `subscribe` that
//!   captures the hub's own facade forms an `Rc` cycle. Use `watch` there.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::change::Change;
use crate::error::{DispatchError, ListenerError};
use crate::value::{Value, WeakValue};

/// Result of a listener invocation.
pub type ListenerResult = Result<(), ListenerError>;

type ListenerFn = dyn Fn(&Change, &Value) -> ListenerResult;

/// A change callback `(change, observed value)`.
///
/// Cloning a `Listener` keeps its identity, so a clone can be used to
/// unsubscribe.
#[derive(Clone)]
pub struct Listener(Rc<ListenerFn>);

impl Listener {
    /// Listener that cannot fail.
    pub fn new(f: impl Fn(&Change, &Value) + 'static) -> Self {
        Self(Rc::new(move |change: &Change, target: &Value| {
            f(change, target);
            Ok(())
        }))
    }

    /// Listener whose failures are reported by `dispatch`.
    pub fn fallible(f: impl Fn(&Change, &Value) -> ListenerResult + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

enum Subscriber {
    Strong(Rc<ListenerFn>),
    Weak(Weak<ListenerFn>),
}

impl Subscriber {
    fn upgrade(&self) -> Option<Rc<ListenerFn>> {
        match self {
            Self::Strong(rc) => Some(Rc::clone(rc)),
            Self::Weak(weak) => weak.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Self::Strong(_) => true,
            Self::Weak(weak) => weak.strong_count() > 0,
        }
    }

    fn is(&self, listener: &Rc<ListenerFn>) -> bool {
        let ptr = match self {
            Self::Strong(rc) => Rc::as_ptr(rc),
            Self::Weak(weak) => weak.as_ptr(),
        };
        std::ptr::addr_eq(ptr, Rc::as_ptr(listener))
    }
}

struct HubInner {
    target: WeakValue,
    /// The public handle when it differs from the target (facades).
    public: RefCell<Option<WeakValue>>,
    subscribers: RefCell<Vec<Subscriber>>,
    dispatches: Cell<u64>,
}

/// Notification hub of one observed value.
///
/// Cloning a `Hub` creates a new handle to the **same** hub.
#[derive(Clone)]
pub struct Hub(Rc<HubInner>);

impl Hub {
    pub(crate) fn new(target: WeakValue) -> Self {
        Self(Rc::new(HubInner {
            target,
            public: RefCell::new(None),
            subscribers: RefCell::new(Vec::new()),
            dispatches: Cell::new(0),
        }))
    }

    pub(crate) fn set_public(&self, public: WeakValue) {
        *self.0.public.borrow_mut() = Some(public);
    }

    /// The observed raw value, while it is alive.
    #[must_use]
    pub fn target(&self) -> Option<Value> {
        self.0.target.upgrade()
    }

    /// The handle `observe` returns for this value: the facade for keyed
    /// containers, the instance itself for patched collections.
    #[must_use]
    pub fn handle(&self) -> Option<Value> {
        match &*self.0.public.borrow() {
            Some(public) => public.upgrade(),
            None => self.target(),
        }
    }

    /// Register a listener. Registering the same listener again is a no-op.
    pub fn subscribe(&self, listener: &Listener) -> &Self {
        let mut subs = self.0.subscribers.borrow_mut();
        if !subs.iter().any(|s| s.is(&listener.0)) {
            subs.push(Subscriber::Strong(Rc::clone(&listener.0)));
        }
        self
    }

    /// Remove a listener. Removing an unknown listener is a no-op.
    pub fn unsubscribe(&self, listener: &Listener) -> &Self {
        self.0
            .subscribers
            .borrow_mut()
            .retain(|s| !s.is(&listener.0));
        self
    }

    /// Register a callback for as long as the returned guard lives.
    pub fn watch(&self, f: impl Fn(&Change, &Value) + 'static) -> Subscription {
        let Listener(strong) = Listener::new(f);
        self.0
            .subscribers
            .borrow_mut()
            .push(Subscriber::Weak(Rc::downgrade(&strong)));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Synchronously call every current listener with `change`.
    ///
    /// # Errors
    ///
    /// Returns every listener failure of this pass. All listeners run
    /// regardless.
    pub fn dispatch(&self, change: &Change) -> Result<&Self, DispatchError> {
        let listeners: Vec<Rc<ListenerFn>> = {
            let mut subs = self.0.subscribers.borrow_mut();
            subs.retain(Subscriber::is_alive);
            subs.iter().filter_map(Subscriber::upgrade).collect()
        };
        self.0.dispatches.set(self.0.dispatches.get() + 1);
        trace!(
            kind = change.kind().as_str(),
            listeners = listeners.len(),
            "dispatching change"
        );

        let target = self.target().unwrap_or_default();
        let mut failures = Vec::new();
        for listener in &listeners {
            if let Err(err) = listener(change, &target) {
                warn!(kind = change.kind().as_str(), error = %err, "listener failed");
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(DispatchError::new(failures))
        }
    }

    /// Number of registered listeners (including dead watchers not yet
    /// pruned).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Number of dispatch passes so far.
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.0.dispatches.get()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Hub {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Hub {}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("target", &self.0.target)
            .field("subscriber_count", &self.subscriber_count())
            .field("dispatches", &self.dispatch_count())
            .finish()
    }
}

/// RAII guard for a callback registered with [`Hub::watch`].
///
/// Dropping the guard drops the only strong reference to the callback; the
/// hub prunes the dead entry on its next dispatch.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use crate::value::Key;

    fn hub_for(obj: &Object) -> Hub {
        Hub::new(Value::from(obj).downgrade().unwrap())
    }

    fn sample(obj: &Object) -> Change {
        Change::add(obj, Some(Key::from("k").into()), 1)
    }

    #[derive(Debug)]
    struct Failed;

    impl fmt::Display for Failed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("failed")
        }
    }

    impl std::error::Error for Failed {}

    #[test]
    fn subscribe_is_idempotent() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let count = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&count);
        let listener = Listener::new(move |_, _| counter.set(counter.get() + 1));

        hub.subscribe(&listener).subscribe(&listener.clone());
        assert_eq!(hub.subscriber_count(), 1);

        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let a = Rc::new(Cell::new(0u32));
        let b = Rc::new(Cell::new(0u32));
        let (a2, b2) = (Rc::clone(&a), Rc::clone(&b));
        let la = Listener::new(move |_, _| a2.set(a2.get() + 1));
        let lb = Listener::new(move |_, _| b2.set(b2.get() + 1));
        hub.subscribe(&la).subscribe(&lb);

        hub.dispatch(&sample(&obj)).unwrap();
        hub.unsubscribe(&la);
        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!((a.get(), b.get()), (1, 2));

        // Unknown listener: no-op.
        hub.unsubscribe(&la);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn registration_order() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ['A', 'B', 'C'] {
            let log = Rc::clone(&log);
            hub.subscribe(&Listener::new(move |_, _| log.borrow_mut().push(tag)));
        }
        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn failing_listener_does_not_stop_others() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let reached = Rc::new(Cell::new(false));
        let flag = Rc::clone(&reached);
        hub.subscribe(&Listener::fallible(|_, _| Err(Box::new(Failed))));
        hub.subscribe(&Listener::new(move |_, _| flag.set(true)));

        let err = hub.dispatch(&sample(&obj)).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(reached.get());
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[test]
    fn listener_sees_target() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        hub.subscribe(&Listener::new(move |_, target| {
            *slot.borrow_mut() = Some(target.clone());
        }));
        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!(seen.borrow().clone(), Some(Value::from(&obj)));
    }

    #[test]
    fn watch_guard_unsubscribes_on_drop() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let count = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&count);
        let guard = hub.watch(move |_, _| counter.set(counter.get() + 1));

        hub.dispatch(&sample(&obj)).unwrap();
        drop(guard);
        assert_eq!(hub.subscriber_count(), 1);
        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.dispatch_count(), 2);
    }

    #[test]
    fn subscribe_during_dispatch_waits_for_next_pass() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let late = Rc::new(Cell::new(0u32));
        let late_counter = Rc::clone(&late);
        let late_listener = Listener::new(move |_, _| late_counter.set(late_counter.get() + 1));
        let hub_ref = hub.clone();
        hub.subscribe(&Listener::new(move |_, _| {
            hub_ref.subscribe(&late_listener);
        }));

        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!(late.get(), 0);
        hub.dispatch(&sample(&obj)).unwrap();
        assert_eq!(late.get(), 1);
    }

    #[test]
    fn dead_target_dispatches_undefined() {
        let obj = Object::new();
        let hub = hub_for(&obj);
        let change = sample(&Object::new());
        drop(obj);
        assert!(hub.target().is_none());
        assert!(hub.handle().is_none());
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        hub.subscribe(&Listener::new(move |_, target| {
            *slot.borrow_mut() = Some(target.clone());
        }));
        hub.dispatch(&change).unwrap();
        assert_eq!(seen.borrow().clone(), Some(Value::Undefined));
    }
}
