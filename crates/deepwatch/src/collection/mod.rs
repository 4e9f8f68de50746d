#![forbid(unsafe_code)]

//! Hash collections: [`Map`], [`Set`], [`WeakMap`], [`WeakSet`].
//!
//! # Design
//!
//! Each instance owns an optional interceptor slot. Empty, every mutating
//! method runs natively. Once the instance is observed with `patch`, the
//! slot holds the interceptor and the same methods run the instrumented
//! path. Only that instance changes behaviour; other instances of the same
//! kind keep running natively.
//!
//! ```text
//!   map.set(k, v) ─► slot empty?  ─► native insert
//!                    slot filled? ─► observe k, v ─► insert ─► notify
//! ```
//!
//! # Invariants
//!
//! 1. Inserting a set element that is already present dispatches nothing.
//! 2. Clearing an empty collection dispatches nothing; clearing a non-empty
//!    one dispatches a single `clear` whose `old` is a snapshot of the same
//!    kind.
//! 3. On a patched instance, lookups accept a raw composite key when its
//!    observed handle is stored, and the other way round.
//! 4. Weak collections hold their keys weakly and never observe them.

mod map;
mod set;
mod weak;

pub use map::Map;
pub(crate) use map::MapCell;
pub use set::Set;
pub(crate) use set::SetCell;
pub use weak::{WeakMap, WeakSet};
pub(crate) use weak::{WeakMapCell, WeakSetCell};

use std::cell::RefCell;
use std::rc::Rc;

use crate::intercept::Interceptor;
use crate::value::Value;

/// Per-instance interceptor slot.
#[derive(Default)]
pub(crate) struct PatchSlot(RefCell<Option<Rc<Interceptor>>>);

impl PatchSlot {
    pub(crate) fn get(&self) -> Option<Rc<Interceptor>> {
        self.0.borrow().clone()
    }

    pub(crate) fn install(&self, interceptor: Rc<Interceptor>) {
        *self.0.borrow_mut() = Some(interceptor);
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// The form under which `key` is stored: itself, or (on a patched instance)
/// one of its registered aliases.
pub(crate) fn stored_form(
    key: &Value,
    interceptor: Option<&Interceptor>,
    contains: impl Fn(&Value) -> bool,
) -> Option<Value> {
    if contains(key) {
        return Some(key.clone());
    }
    interceptor?
        .aliases(key)
        .into_iter()
        .find(|alias| contains(alias))
}
