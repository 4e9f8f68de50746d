#![forbid(unsafe_code)]

//! Interception traps shared by facades and patched collections.
//!
//! # Design
//!
//! Every observation builds one [`Notifier`]: the value's hub plus the
//! notifier of the container it was first observed inside, if any.
//! Notifying walks the chain root-first, so a relaying ancestor sees a
//! change before the originating hub's own listeners.
//!
//! An [`Interceptor`] bundles the notifier with the options the value was
//! observed with and a weak handle to the registry that observed it. Facades
//! own one; patched collections keep one in their per-instance slot.
//!
//! # Invariants
//!
//! 1. A refused definition or deletion dispatches nothing and returns the
//!    refusal unchanged.
//! 2. A definition that leaves an existing slot's value strictly equal
//!    ([`Value::strict_eq`]) dispatches nothing.
//! 3. The change is dispatched after the mutation is applied, before the
//!    mutating call returns.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::change::Change;
use crate::classify;
use crate::error::{DispatchError, ObserveError};
use crate::hub::Hub;
use crate::object::{Object, Property, PropertyDescriptor};
use crate::options::ObserveOptions;
use crate::registry::WeakRegistry;
use crate::value::{Key, Value};

/// A hub plus the chain of ancestors a change bubbles through.
pub(crate) struct Notifier {
    hub: Hub,
    parent: Option<Rc<Notifier>>,
}

impl Notifier {
    pub(crate) fn new(hub: Hub, parent: Option<Rc<Notifier>>) -> Self {
        Self { hub, parent }
    }

    /// Relay to the ancestors, then dispatch on the own hub.
    pub(crate) fn notify(&self, change: &Change) -> Result<(), DispatchError> {
        let relayed = match &self.parent {
            Some(parent) => parent.notify(change),
            None => Ok(()),
        };
        let local = self.hub.dispatch(change).map(|_| ());
        DispatchError::merge(relayed, local)
    }
}

pub(crate) struct Interceptor {
    notifier: Rc<Notifier>,
    options: ObserveOptions,
    registry: WeakRegistry,
}

impl Interceptor {
    pub(crate) fn new(notifier: Rc<Notifier>, options: ObserveOptions, registry: WeakRegistry) -> Self {
        Self {
            notifier,
            options,
            registry,
        }
    }

    pub(crate) fn options(&self) -> &ObserveOptions {
        &self.options
    }

    pub(crate) fn notify(&self, change: &Change) -> Result<(), ObserveError> {
        self.notifier.notify(change).map_err(ObserveError::from)
    }

    /// Observe a nested value with this notifier as its parent, falling
    /// back to the value itself when that is not possible.
    pub(crate) fn observe_nested(&self, value: Value) -> Value {
        let Some(registry) = self.registry.upgrade() else {
            return value;
        };
        match registry.observe_within(value.clone(), &self.options, Some(&self.notifier)) {
            Ok(handle) => handle,
            Err(err) => {
                trace!(error = %err, "nested value left unobserved");
                value
            }
        }
    }

    /// Observe a collection entry when deep observation applies to it.
    pub(crate) fn observe_entry(&self, value: Value) -> Value {
        if self.options.deep && classify::is_entry_observable(&value, &self.options) {
            self.observe_nested(value)
        } else {
            value
        }
    }

    /// Other handles under which `value` may be stored: its observed handle
    /// and its raw target.
    pub(crate) fn aliases(&self, value: &Value) -> Vec<Value> {
        let Some(hub) = self.registry.upgrade().and_then(|r| r.lookup(value)) else {
            return Vec::new();
        };
        hub.handle()
            .into_iter()
            .chain(hub.target())
            .filter(|alias| alias != value)
            .collect()
    }

    /// Define trap.
    pub(crate) fn define(
        &self,
        facade: &Object,
        target: &Object,
        key: Key,
        desc: PropertyDescriptor,
    ) -> Result<(), ObserveError> {
        let existing = target.get_own_property(&key);
        let changed = existing.is_some();
        let old = if changed { target.get(&key) } else { Value::Undefined };

        let probe = completed(&desc, existing.as_ref());
        let desc = if self.options.deep && classify::is_descriptor_observable(&probe, &key, &self.options) {
            match desc.value().cloned() {
                Some(value) => desc.with_value(self.observe_nested(value)),
                None => desc,
            }
        } else {
            desc
        };

        if let Err(err) = target.define_property(key.clone(), desc) {
            trace!(key = %key, error = %err, "definition rejected");
            return Err(err);
        }

        let value = target.get(&key);
        if changed && value.strict_eq(&old) {
            return Ok(());
        }
        let change = if changed {
            Change::set(facade, key.into(), value, old)
        } else {
            Change::add(facade, Some(key.into()), value)
        };
        self.notify(&change)
    }

    /// Delete trap. `Ok(false)` when there was nothing to delete.
    pub(crate) fn delete(&self, facade: &Object, target: &Object, key: Key) -> Result<bool, ObserveError> {
        if !target.has_own(&key) {
            return Ok(false);
        }
        let old = target.get(&key);
        let removed = match target.delete(key.clone()) {
            Ok(removed) => removed,
            Err(err) => {
                trace!(key = %key, error = %err, "deletion rejected");
                return Err(err);
            }
        };
        if removed {
            self.notify(&Change::delete(facade, Some(key.into()), old))?;
        }
        Ok(removed)
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("hub", &self.notifier.hub)
            .field("relays", &self.notifier.parent.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// The descriptor as it will apply to the slot: attributes absent from
/// `desc` are taken from the existing data slot.
fn completed(desc: &PropertyDescriptor, existing: Option<&Property>) -> PropertyDescriptor {
    let Some(current) = existing.filter(|p| p.is_data()) else {
        return desc.clone();
    };
    let mut probe = desc.clone();
    if desc.writable().is_none() {
        probe = probe.with_writable(current.writable());
    }
    if desc.configurable().is_none() {
        probe = probe.with_configurable(current.configurable);
    }
    probe
}
