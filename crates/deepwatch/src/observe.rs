#![forbid(unsafe_code)]

//! The interception engine: `observe`.
//!
//! # Design
//!
//! Observing a value creates its hub, registers it, and installs one of two
//! strategies:
//!
//! - **Facade** for keyed containers: a new [`Object`] handle that shares
//!   the raw store and routes definitions and deletions through the traps.
//!   The facade is registered as an alias of the raw value and returned.
//! - **Patch** for hash collections (only with `patch`): an interceptor is
//!   installed in the instance's own slot and the instance itself is
//!   returned.
//!
//! # Invariants
//!
//! 1. Observing an observed value (raw or handle) returns the existing
//!    handle; no second hub is created and the options of the first
//!    observation stay in force.
//! 2. The facade is registered before nested values are observed, so a
//!    value that reaches itself resolves to its own facade.
//! 3. Nested values are observed before the handle is returned.

use std::rc::Rc;

use tracing::debug;

use crate::classify;
use crate::deep;
use crate::error::ObserveError;
use crate::hub::Hub;
use crate::intercept::{Interceptor, Notifier};
use crate::object::Object;
use crate::options::ObserveOptions;
use crate::registry::Registry;
use crate::value::Value;

impl Registry {
    /// Observe `value` with default options.
    ///
    /// # Errors
    ///
    /// See [`Registry::observe_with`].
    pub fn observe(&self, value: impl Into<Value>) -> Result<Value, ObserveError> {
        self.observe_with(value, &ObserveOptions::default())
    }

    /// Observe `value` and return its public handle.
    ///
    /// # Errors
    ///
    /// - [`ObserveError::NotObservable`] for scalars and dates.
    /// - [`ObserveError::PatchRequired`] for hash collections without
    ///   `patch`.
    /// - [`ObserveError::Rejected`] if a nested slot cannot be rewritten.
    pub fn observe_with(
        &self,
        value: impl Into<Value>,
        options: &ObserveOptions,
    ) -> Result<Value, ObserveError> {
        self.observe_within(value.into(), options, None)
    }

    pub(crate) fn observe_within(
        &self,
        value: Value,
        options: &ObserveOptions,
        parent: Option<&Rc<Notifier>>,
    ) -> Result<Value, ObserveError> {
        if !classify::is_observable(&value) {
            return Err(ObserveError::NotObservable {
                kind: value.kind_name(),
            });
        }
        let existing = self.lookup(&value);
        if let Some(handle) = existing.as_ref().and_then(Hub::handle) {
            return Ok(handle);
        }
        if classify::is_hash_collection(&value) && !options.patch {
            return Err(ObserveError::PatchRequired {
                kind: value.kind_name(),
            });
        }

        let hub = match existing {
            Some(hub) => hub,
            None => {
                let anchor = value.downgrade().ok_or(ObserveError::NotObservable {
                    kind: value.kind_name(),
                })?;
                let hub = Hub::new(anchor);
                self.register(&value, &hub);
                debug!(
                    kind = value.kind_name(),
                    deep = options.deep,
                    nested = parent.is_some(),
                    "created hub"
                );
                hub
            }
        };
        let notifier = Rc::new(Notifier::new(hub.clone(), parent.cloned()));
        let interceptor = Interceptor::new(notifier, options.clone(), self.downgrade());

        match value {
            Value::Object(raw) => self.wrap_object(raw, &hub, interceptor),
            Value::Map(map) => {
                map.install(Rc::new(interceptor));
                Ok(Value::Map(map))
            }
            Value::Set(set) => {
                set.install(Rc::new(interceptor));
                Ok(Value::Set(set))
            }
            Value::WeakMap(map) => {
                map.install(Rc::new(interceptor));
                Ok(Value::WeakMap(map))
            }
            Value::WeakSet(set) => {
                set.install(Rc::new(interceptor));
                Ok(Value::WeakSet(set))
            }
            other => Err(ObserveError::NotObservable {
                kind: other.kind_name(),
            }),
        }
    }

    fn wrap_object(
        &self,
        raw: Object,
        hub: &Hub,
        interceptor: Interceptor,
    ) -> Result<Value, ObserveError> {
        let facade = Object::facade(raw.clone(), interceptor);
        let handle = Value::from(&facade);
        if let Some(public) = handle.downgrade() {
            hub.set_public(public);
        }
        self.register_alias(&handle, hub);

        if let Some(interceptor) = facade.interceptor()
            && interceptor.options().deep
        {
            deep::observe_slots(&raw, interceptor)?;
        }
        Ok(handle)
    }
}
