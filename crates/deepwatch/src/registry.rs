#![forbid(unsafe_code)]

//! Identity registry: maps observed values and their handles to hubs.
//!
//! # Design
//!
//! A side table keyed by [`Identity`]. Each entry holds a weak anchor to the
//! registered container and a strong handle to its [`Hub`]; the registry
//! never keeps a value alive. A facade registers twice (raw target and
//! facade, one hub); a patched collection registers once.
//!
//! Dead entries are pruned lazily: lookups ignore them, and every
//! [`PRUNE_INTERVAL`] registrations sweep the table.
//!
//! Each thread has a default registry behind the crate-level free
//! functions. Independent registries can be created for isolation; values
//! observed in one are unknown to the others.
//!
//! # Invariants
//!
//! 1. An identity maps to at most one hub.
//! 2. A live anchor pins its allocation, so a live entry's identity cannot
//!    be reused by another value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::classify;
use crate::error::ObserveError;
use crate::hub::Hub;
use crate::value::{Identity, Value, WeakValue};

/// Registrations between two full sweeps of dead entries.
pub const PRUNE_INTERVAL: u64 = 64;

thread_local! {
    static DEFAULT: Registry = Registry::new();
}

struct Entry {
    anchor: WeakValue,
    hub: Hub,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<Identity, Entry>,
    registrations: u64,
}

/// Identity-keyed table of observed values.
///
/// Cloning a `Registry` creates a new handle to the **same** table.
#[derive(Clone, Default)]
pub struct Registry(Rc<RefCell<RegistryInner>>);

/// Non-owning handle held by interceptors.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RefCell<RegistryInner>>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(Registry)
    }
}

impl Registry {
    /// An empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This thread's default registry.
    #[must_use]
    pub fn current() -> Self {
        DEFAULT.with(Clone::clone)
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.0))
    }

    /// Associate a raw value with its hub.
    pub(crate) fn register(&self, value: &Value, hub: &Hub) {
        let Some(anchor) = value.downgrade() else {
            return;
        };
        let due = {
            let mut inner = self.0.borrow_mut();
            inner.entries.insert(
                anchor.identity(),
                Entry {
                    anchor,
                    hub: hub.clone(),
                },
            );
            inner.registrations += 1;
            inner.registrations % PRUNE_INTERVAL == 0
        };
        if due {
            self.prune();
        }
    }

    /// Associate a public handle (facade) with an existing hub.
    pub(crate) fn register_alias(&self, handle: &Value, hub: &Hub) {
        self.register(handle, hub);
    }

    /// The hub of a value or handle, if it is observed here.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Option<Hub> {
        let identity = value.identity()?;
        let inner = self.0.borrow();
        inner
            .entries
            .get(&identity)
            .filter(|entry| entry.anchor.is_alive())
            .map(|entry| entry.hub.clone())
    }

    /// Whether a hub is registered for the value or handle.
    #[must_use]
    pub fn has(&self, value: &Value) -> bool {
        self.lookup(value).is_some()
    }

    /// Whether the value is observable and observed here.
    #[must_use]
    pub fn is(&self, value: &Value) -> bool {
        classify::is_observable(value) && self.has(value)
    }

    /// The hub of a value or handle.
    ///
    /// # Errors
    ///
    /// [`ObserveError::NotObserved`] when nothing is registered for it.
    pub fn get(&self, value: &Value) -> Result<Hub, ObserveError> {
        self.lookup(value).ok_or(ObserveError::NotObserved)
    }

    /// The handle `observe` returned for the value, while it is alive.
    #[must_use]
    pub fn public_handle(&self, value: &Value) -> Option<Value> {
        self.lookup(value)?.handle()
    }

    /// Number of live entries (raw values and facades).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0
            .borrow()
            .entries
            .values()
            .filter(|entry| entry.anchor.is_alive())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose value is gone. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut inner = self.0.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.anchor.is_alive());
        let removed = before - inner.entries.len();
        if removed > 0 {
            trace!(removed, remaining = inner.entries.len(), "pruned registry");
        }
        removed
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => f
                .debug_struct("Registry")
                .field("entries", &inner.entries.len())
                .field("registrations", &inner.registrations)
                .finish(),
            Err(_) => f.debug_struct("Registry").finish_non_exhaustive(),
        }
    }
}
