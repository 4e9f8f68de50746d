#![forbid(unsafe_code)]

//! Insertion-ordered set of [`Value`]s.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::debug;

use super::{PatchSlot, stored_form};
use crate::change::Change;
use crate::error::ObserveError;
use crate::intercept::Interceptor;
use crate::value::{Identity, Value};

pub(crate) struct SetCell {
    items: RefCell<IndexSet<Value>>,
    patch: PatchSlot,
}

impl SetCell {
    fn new(items: IndexSet<Value>) -> Self {
        Self {
            items: RefCell::new(items),
            patch: PatchSlot::default(),
        }
    }
}

/// Set-like collection with SameValueZero membership, iterated in insertion
/// order.
///
/// Cloning a `Set` creates a new handle to the **same** set.
#[derive(Clone)]
pub struct Set(pub(crate) Rc<SetCell>);

impl Default for Set {
    fn default() -> Self {
        Self::new()
    }
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(SetCell::new(IndexSet::new())))
    }

    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        values.into_iter().fold(Self::new(), |set, v| set.with(v))
    }

    /// Builder-style native insert. Never intercepted.
    #[must_use]
    pub fn with(self, value: impl Into<Value>) -> Self {
        self.0.items.borrow_mut().insert(value.into());
        self
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this instance runs the instrumented methods.
    #[must_use]
    pub fn is_patched(&self) -> bool {
        self.0.patch.is_installed()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stored(&self, value: &Value, interceptor: Option<&Interceptor>) -> Option<Value> {
        stored_form(value, interceptor, |v| self.0.items.borrow().contains(v))
    }

    #[must_use]
    pub fn has(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.stored(&value, self.0.patch.get().as_deref()).is_some()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.0.items.borrow().iter().cloned().collect()
    }

    /// Insert an element. When patched, a new element is observed and an
    /// `add` is dispatched; an element already present is a no-op.
    pub fn add(&self, value: impl Into<Value>) -> Result<&Self, ObserveError> {
        let value = value.into();
        let Some(interceptor) = self.0.patch.get() else {
            self.0.items.borrow_mut().insert(value);
            return Ok(self);
        };
        if self.stored(&value, Some(&*interceptor)).is_some() {
            return Ok(self);
        }
        let value = interceptor.observe_entry(value);
        if self.0.items.borrow_mut().insert(value.clone()) {
            interceptor.notify(&Change::add(self, None, value))?;
        }
        Ok(self)
    }

    /// Remove an element. `Ok(false)` when it was absent.
    pub fn delete(&self, value: impl Into<Value>) -> Result<bool, ObserveError> {
        let value = value.into();
        let Some(interceptor) = self.0.patch.get() else {
            return Ok(self.0.items.borrow_mut().shift_remove(&value));
        };
        let Some(stored) = self.stored(&value, Some(&*interceptor)) else {
            return Ok(false);
        };
        if !self.0.items.borrow_mut().shift_remove(&stored) {
            return Ok(false);
        }
        interceptor.notify(&Change::delete(self, None, stored))?;
        Ok(true)
    }

    /// Remove every element. When patched and non-empty, dispatches one
    /// `clear` carrying an unobserved snapshot of the former elements.
    pub fn clear(&self) -> Result<(), ObserveError> {
        if self.is_empty() {
            return Ok(());
        }
        let previous = std::mem::take(&mut *self.0.items.borrow_mut());
        if let Some(interceptor) = self.0.patch.get() {
            let snapshot = Self(Rc::new(SetCell::new(previous)));
            interceptor.notify(&Change::clear(self, snapshot))?;
        }
        Ok(())
    }

    pub(crate) fn install(&self, interceptor: Rc<Interceptor>) {
        self.0.patch.install(Rc::clone(&interceptor));
        debug!(kind = "set", entries = self.len(), "patched collection");
        if !interceptor.options().deep {
            return;
        }
        let existing = std::mem::take(&mut *self.0.items.borrow_mut());
        for value in existing {
            let value = interceptor.observe_entry(value);
            self.0.items.borrow_mut().insert(value);
        }
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Set {}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Set");
        s.field("identity", &self.identity())
            .field("patched", &self.is_patched());
        if let Ok(items) = self.0.items.try_borrow() {
            s.field("len", &items.len());
        }
        s.finish()
    }
}
