#![forbid(unsafe_code)]

//! Weakly-keyed collections.
//!
//! Keys are composite values held through [`WeakValue`] and indexed by
//! [`Identity`]. There is no enumeration, size, or clear. Entries whose key
//! died are dropped on the next insertion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::{PatchSlot, stored_form};
use crate::change::{Change, ChangeKey};
use crate::error::ObserveError;
use crate::intercept::Interceptor;
use crate::value::{Identity, Value, WeakValue};

fn weak_key(key: &Value) -> Result<WeakValue, ObserveError> {
    key.downgrade().ok_or(ObserveError::InvalidWeakKey {
        kind: key.kind_name(),
    })
}

struct WeakEntry {
    key: WeakValue,
    value: Value,
}

pub(crate) struct WeakMapCell {
    entries: RefCell<HashMap<Identity, WeakEntry>>,
    patch: PatchSlot,
}

/// Map from composite keys (held weakly) to values.
///
/// Cloning a `WeakMap` creates a new handle to the **same** map.
#[derive(Clone)]
pub struct WeakMap(pub(crate) Rc<WeakMapCell>);

impl Default for WeakMap {
    fn default() -> Self {
        Self::new()
    }
}

impl WeakMap {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(WeakMapCell {
            entries: RefCell::new(HashMap::new()),
            patch: PatchSlot::default(),
        }))
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn is_patched(&self) -> bool {
        self.0.patch.is_installed()
    }

    fn contains(&self, key: &Value) -> bool {
        key.identity().is_some_and(|id| {
            self.0
                .entries
                .borrow()
                .get(&id)
                .is_some_and(|entry| entry.key.is_alive())
        })
    }

    fn stored_key(&self, key: &Value, interceptor: Option<&Interceptor>) -> Option<Value> {
        stored_form(key, interceptor, |k| self.contains(k))
    }

    fn value_of(&self, stored: &Value) -> Option<Value> {
        let id = stored.identity()?;
        self.0.entries.borrow().get(&id).map(|entry| entry.value.clone())
    }

    #[must_use]
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let stored = self.stored_key(&key, self.0.patch.get().as_deref())?;
        self.value_of(&stored)
    }

    #[must_use]
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        self.stored_key(&key, self.0.patch.get().as_deref()).is_some()
    }

    fn insert(&self, anchor: WeakValue, value: Value) {
        let mut entries = self.0.entries.borrow_mut();
        entries.retain(|_, entry| entry.key.is_alive());
        entries.insert(anchor.identity(), WeakEntry { key: anchor, value });
    }

    /// Insert or replace an entry.
    ///
    /// # Errors
    ///
    /// [`ObserveError::InvalidWeakKey`] for scalar keys.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<&Self, ObserveError> {
        let key = key.into();
        let value = value.into();
        let Some(interceptor) = self.0.patch.get() else {
            self.insert(weak_key(&key)?, value);
            return Ok(self);
        };

        let (key, old) = match self.stored_key(&key, Some(&*interceptor)) {
            Some(stored) => {
                let old = self.value_of(&stored);
                (stored, old)
            }
            None => (key, None),
        };
        let anchor = weak_key(&key)?;
        let value = interceptor.observe_entry(value);
        self.insert(anchor, value.clone());

        let change = match old {
            Some(old) if old.strict_eq(&value) => return Ok(self),
            Some(old) => Change::set(self, ChangeKey::Entry(key), value, old),
            None => Change::add(self, Some(ChangeKey::Entry(key)), value),
        };
        interceptor.notify(&change)?;
        Ok(self)
    }

    /// Remove an entry. `Ok(false)` when absent (scalar keys are never
    /// present).
    pub fn delete(&self, key: impl Into<Value>) -> Result<bool, ObserveError> {
        let key = key.into();
        let interceptor = self.0.patch.get();
        let Some(stored) = self.stored_key(&key, interceptor.as_deref()) else {
            return Ok(false);
        };
        let Some(id) = stored.identity() else {
            return Ok(false);
        };
        let Some(old) = self.0.entries.borrow_mut().remove(&id) else {
            return Ok(false);
        };
        if let Some(interceptor) = interceptor {
            interceptor.notify(&Change::delete(self, Some(ChangeKey::Entry(stored)), old.value))?;
        }
        Ok(true)
    }

    /// Weak collections cannot be enumerated, so nothing is re-inserted.
    pub(crate) fn install(&self, interceptor: Rc<Interceptor>) {
        self.0.patch.install(interceptor);
        debug!(kind = "weakmap", "patched collection");
    }
}

impl PartialEq for WeakMap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for WeakMap {}

impl fmt::Debug for WeakMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakMap")
            .field("identity", &self.identity())
            .field("patched", &self.is_patched())
            .finish_non_exhaustive()
    }
}

pub(crate) struct WeakSetCell {
    items: RefCell<HashMap<Identity, WeakValue>>,
    patch: PatchSlot,
}

/// Set of composite values held weakly.
///
/// Cloning a `WeakSet` creates a new handle to the **same** set.
#[derive(Clone)]
pub struct WeakSet(pub(crate) Rc<WeakSetCell>);

impl Default for WeakSet {
    fn default() -> Self {
        Self::new()
    }
}

impl WeakSet {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(WeakSetCell {
            items: RefCell::new(HashMap::new()),
            patch: PatchSlot::default(),
        }))
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn is_patched(&self) -> bool {
        self.0.patch.is_installed()
    }

    fn contains(&self, value: &Value) -> bool {
        value.identity().is_some_and(|id| {
            self.0
                .items
                .borrow()
                .get(&id)
                .is_some_and(WeakValue::is_alive)
        })
    }

    fn stored(&self, value: &Value, interceptor: Option<&Interceptor>) -> Option<Value> {
        stored_form(value, interceptor, |v| self.contains(v))
    }

    #[must_use]
    pub fn has(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.stored(&value, self.0.patch.get().as_deref()).is_some()
    }

    /// Insert an element. When patched, a new element dispatches `add`; an
    /// element already present is a no-op.
    ///
    /// # Errors
    ///
    /// [`ObserveError::InvalidWeakKey`] for scalars.
    pub fn add(&self, value: impl Into<Value>) -> Result<&Self, ObserveError> {
        let value = value.into();
        let anchor = weak_key(&value)?;
        let interceptor = self.0.patch.get();
        if self.stored(&value, interceptor.as_deref()).is_some() {
            return Ok(self);
        }
        {
            let mut items = self.0.items.borrow_mut();
            items.retain(|_, item| item.is_alive());
            items.insert(anchor.identity(), anchor);
        }
        if let Some(interceptor) = interceptor {
            interceptor.notify(&Change::add(self, None, value))?;
        }
        Ok(self)
    }

    /// Remove an element. `Ok(false)` when absent.
    pub fn delete(&self, value: impl Into<Value>) -> Result<bool, ObserveError> {
        let value = value.into();
        let interceptor = self.0.patch.get();
        let Some(stored) = self.stored(&value, interceptor.as_deref()) else {
            return Ok(false);
        };
        let Some(id) = stored.identity() else {
            return Ok(false);
        };
        if self.0.items.borrow_mut().remove(&id).is_none() {
            return Ok(false);
        }
        if let Some(interceptor) = interceptor {
            interceptor.notify(&Change::delete(self, None, stored))?;
        }
        Ok(true)
    }

    pub(crate) fn install(&self, interceptor: Rc<Interceptor>) {
        self.0.patch.install(interceptor);
        debug!(kind = "weakset", "patched collection");
    }
}

impl PartialEq for WeakSet {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for WeakSet {}

impl fmt::Debug for WeakSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSet")
            .field("identity", &self.identity())
            .field("patched", &self.is_patched())
            .finish_non_exhaustive()
    }
}
