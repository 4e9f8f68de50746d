#![forbid(unsafe_code)]

//! Deep change observation for composite values.
//!
//! [`observe`] takes an object, array, class instance, or (with the `patch`
//! option) a hash collection and returns a handle whose mutations are
//! reported to the value's [`Hub`] as [`Change`] descriptors:
//!
//! - keyed containers get a facade: a new [`Object`] handle sharing the
//!   original storage whose definitions and deletions are intercepted;
//! - hash collections are instrumented in place and returned as-is.
//!
//! Nested observable values are observed too (option `deep`, on by
//! default), and their changes bubble up to every ancestor hub.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use deepwatch::{ChangeKind, Listener, Object, Value};
//!
//! let state = deepwatch::observe(Object::from_entries([("key", "value1")])).unwrap();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! deepwatch::get(&state)
//!     .unwrap()
//!     .subscribe(&Listener::new(move |change, _| sink.borrow_mut().push(change.kind())));
//!
//! state.as_object().unwrap().set("key", "value2").unwrap();
//! assert_eq!(*seen.borrow(), vec![ChangeKind::Set]);
//! assert!(deepwatch::is(&state));
//! assert!(!deepwatch::is(Value::from(1)));
//! ```
//!
//! Everything is single-threaded (`Rc`-based) and dispatch is synchronous:
//! a change is delivered before the mutating call returns.

pub mod change;
pub mod classify;
pub mod collection;
mod deep;
pub mod error;
pub mod hub;
mod intercept;
#[cfg(feature = "json")]
mod json;
pub mod object;
mod observe;
pub mod options;
pub mod registry;
pub mod value;

pub use change::{Change, ChangeKey, ChangeKind};
pub use collection::{Map, Set, WeakMap, WeakSet};
pub use error::{DispatchError, ListenerError, ObserveError, Rejection};
pub use hub::{Hub, Listener, ListenerResult, Subscription};
pub use object::{Class, Object, Property, PropertyDescriptor, Slot};
pub use options::ObserveOptions;
pub use registry::Registry;
pub use value::{Identity, Key, Value, WeakValue};

/// Observe `value` with default options in this thread's registry.
///
/// # Errors
///
/// See [`Registry::observe_with`].
pub fn observe(value: impl Into<Value>) -> Result<Value, ObserveError> {
    Registry::current().observe(value)
}

/// Observe `value` with `options` in this thread's registry.
///
/// # Errors
///
/// See [`Registry::observe_with`].
pub fn observe_with(value: impl Into<Value>, options: &ObserveOptions) -> Result<Value, ObserveError> {
    Registry::current().observe_with(value, options)
}

/// The hub of an observed value or handle.
///
/// # Errors
///
/// [`ObserveError::NotObserved`] when the value was never observed here.
pub fn get(value: impl Into<Value>) -> Result<Hub, ObserveError> {
    Registry::current().get(&value.into())
}

/// Whether the value (or handle) is observed in this thread's registry.
#[must_use]
pub fn is(value: impl Into<Value>) -> bool {
    Registry::current().is(&value.into())
}
