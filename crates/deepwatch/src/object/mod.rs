#![forbid(unsafe_code)]

//! Keyed containers: plain objects, arrays, and class instances.
//!
//! # Design
//!
//! An [`Object`] is a reference-counted handle. A *raw* object owns its
//! property store. A *facade* is a second handle with its own identity that
//! shares the raw object's store and routes slot definition and deletion
//! through an interceptor; every read delegates straight to the store.
//!
//! ```text
//!   facade ──► interceptor ──► hub.dispatch
//!     │
//!     └──────► raw object ──► Store (own properties)
//! ```
//!
//! Mutating the raw handle directly bypasses the interceptor, so nothing is
//! dispatched.
//!
//! # Failure Modes
//!
//! - **Refused mutation**: definitions and deletions that the store refuses
//!   return [`ObserveError::Rejected`] from both raw and facade handles.
//! - **Re-entrant accessors**: getters and setters run with no store borrow
//!   held, so they may read or write the same object.

mod array;
mod descriptor;
mod store;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use descriptor::{Getter, Property, PropertyDescriptor, Setter, Slot};
pub(crate) use store::Store;

use crate::error::{ObserveError, Rejection};
use crate::intercept::Interceptor;
use crate::value::{Identity, Key, Value};

/// What kind of keyed container an [`Object`] is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Class {
    Object,
    Array,
    /// Instance of a named user class.
    Instance(Rc<str>),
}

pub(crate) enum ObjectCell {
    Raw(RefCell<Store>),
    Facade {
        target: Object,
        interceptor: Interceptor,
    },
}

/// Handle to a keyed container.
///
/// Cloning an `Object` creates a new handle to the **same** container.
#[derive(Clone)]
pub struct Object(pub(crate) Rc<ObjectCell>);

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    /// Empty plain object.
    #[must_use]
    pub fn new() -> Self {
        Self::with_class(Class::Object)
    }

    /// Empty array.
    #[must_use]
    pub fn array() -> Self {
        Self::with_class(Class::Array)
    }

    /// Empty instance of a named class.
    #[must_use]
    pub fn instance(class: impl Into<Rc<str>>) -> Self {
        Self::with_class(Class::Instance(class.into()))
    }

    fn with_class(class: Class) -> Self {
        Self(Rc::new(ObjectCell::Raw(RefCell::new(Store::new(class)))))
    }

    /// Plain object with the given entries.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        entries
            .into_iter()
            .fold(Self::new(), |obj, (k, v)| obj.with(k, v))
    }

    /// Array holding the given elements.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        values
            .into_iter()
            .enumerate()
            .fold(Self::array(), |arr, (i, v)| arr.with(i, v))
    }

    /// Builder-style insert of a plain data slot.
    ///
    /// Writes straight into the store: no validation, no interception. Meant
    /// for constructing values, not for mutating observed ones.
    #[must_use]
    pub fn with(self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.with_store_mut(|store| store.insert(key.into(), value.into()));
        self
    }

    pub(crate) fn facade(target: Object, interceptor: Interceptor) -> Self {
        Self(Rc::new(ObjectCell::Facade {
            target,
            interceptor,
        }))
    }

    pub(crate) fn interceptor(&self) -> Option<&Interceptor> {
        match &*self.0 {
            ObjectCell::Raw(_) => None,
            ObjectCell::Facade { interceptor, .. } => Some(interceptor),
        }
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    /// Whether both handles refer to the same container.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this handle is an intercepting facade.
    #[must_use]
    pub fn is_facade(&self) -> bool {
        matches!(*self.0, ObjectCell::Facade { .. })
    }

    /// The raw object behind a facade, or `self` for a raw object.
    #[must_use]
    pub fn raw(&self) -> Object {
        match &*self.0 {
            ObjectCell::Raw(_) => self.clone(),
            ObjectCell::Facade { target, .. } => target.raw(),
        }
    }

    fn with_store<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        match &*self.0 {
            ObjectCell::Raw(store) => f(&store.borrow()),
            ObjectCell::Facade { target, .. } => target.with_store(f),
        }
    }

    fn with_store_mut<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        match &*self.0 {
            ObjectCell::Raw(store) => f(&mut store.borrow_mut()),
            ObjectCell::Facade { target, .. } => target.with_store_mut(f),
        }
    }

    #[must_use]
    pub fn class(&self) -> Class {
        self.with_store(|s| s.class().clone())
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.with_store(Store::is_array)
    }

    #[must_use]
    pub fn is_extensible(&self) -> bool {
        self.with_store(Store::is_extensible)
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.with_store(Store::is_frozen)
    }

    /// Array length, or the number of own enumerable properties otherwise.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_store(|s| match s.array_len() {
            Some(len) => len as usize,
            None => s.enumerable_count(),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get_own_property(&self, key: impl Into<Key>) -> Option<Property> {
        let key = key.into();
        self.with_store(|s| s.get_own(&key))
    }

    #[must_use]
    pub fn has_own(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.with_store(|s| s.has_own(&key))
    }

    /// Current value of a slot: the data value, the getter's result, or
    /// `undefined` when absent.
    #[must_use]
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let getter = match self.get_own_property(key) {
            None => return Value::Undefined,
            Some(Property {
                slot: Slot::Data { value, .. },
                ..
            }) => return value,
            Some(Property {
                slot: Slot::Accessor { get, .. },
                ..
            }) => get,
        };
        getter.map(|get| get()).unwrap_or_default()
    }

    /// Every own key, enumerable or not.
    #[must_use]
    pub fn own_keys(&self) -> Vec<Key> {
        self.with_store(Store::own_keys)
    }

    /// Own enumerable keys.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.own_keys()
            .into_iter()
            .filter(|k| self.get_own_property(k).is_some_and(|p| p.enumerable))
            .collect()
    }

    /// Own enumerable entries.
    #[must_use]
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .map(|k| {
                let v = self.get(&k);
                (k, v)
            })
            .collect()
    }

    /// Assign a value, as `obj[key] = value` would.
    ///
    /// Existing writable data slots keep their attributes, new slots are
    /// created writable, enumerable and configurable, and accessor slots call
    /// their setter. Through a facade the definition is intercepted.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ObserveError> {
        let key = key.into();
        let value = value.into();
        match self.get_own_property(&key) {
            None => self.define_property(key, PropertyDescriptor::plain(value)),
            Some(Property {
                slot: Slot::Data { writable: true, .. },
                ..
            }) => self.define_property(key, PropertyDescriptor::data(value)),
            Some(Property {
                slot: Slot::Data { .. },
                ..
            }) => Err(ObserveError::rejected(key, Rejection::NonWritable)),
            Some(Property {
                slot: Slot::Accessor { set: Some(set), .. },
                ..
            }) => {
                set(value);
                Ok(())
            }
            Some(Property {
                slot: Slot::Accessor { set: None, .. },
                ..
            }) => Err(ObserveError::rejected(key, Rejection::NoSetter)),
        }
    }

    /// Define or redefine a slot.
    pub fn define_property(
        &self,
        key: impl Into<Key>,
        desc: PropertyDescriptor,
    ) -> Result<(), ObserveError> {
        let key = key.into();
        match &*self.0 {
            ObjectCell::Raw(store) => {
                let result = store.borrow_mut().define(&key, desc);
                result.map_err(|reason| ObserveError::rejected(key, reason))
            }
            ObjectCell::Facade {
                target,
                interceptor,
            } => interceptor.define(self, target, key, desc),
        }
    }

    /// Delete a slot.
    ///
    /// Returns `Ok(true)` when a slot was removed and `Ok(false)` when there
    /// was nothing to remove.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, ObserveError> {
        let key = key.into();
        match &*self.0 {
            ObjectCell::Raw(store) => {
                let result = store.borrow_mut().delete(&key);
                result.map_err(|reason| ObserveError::rejected(key, reason))
            }
            ObjectCell::Facade {
                target,
                interceptor,
            } => interceptor.delete(self, target, key),
        }
    }

    /// Refuse new slots from now on. Not intercepted.
    pub fn prevent_extensions(&self) {
        self.with_store_mut(Store::prevent_extensions);
    }

    /// Lock every slot and refuse new ones. Not intercepted.
    pub fn freeze(&self) {
        self.with_store_mut(Store::freeze);
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        let mut s = f.debug_struct("Object");
        s.field("identity", &self.identity())
            .field("facade", &self.is_facade());
        if let ObjectCell::Raw(store) = &*raw.0
            && let Ok(store) = store.try_borrow()
        {
            s.field("class", store.class())
                .field("keys", &store.own_keys().len());
        }
        s.finish()
    }
}
