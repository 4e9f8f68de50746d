#![forbid(unsafe_code)]

//! Deep-observation driver for keyed containers.

use crate::classify;
use crate::error::ObserveError;
use crate::intercept::Interceptor;
use crate::object::{Object, PropertyDescriptor};

/// Observe every eligible own enumerable slot of `target` and store the
/// observed handle back into the slot.
///
/// Writes go to the raw target, so nothing is dispatched. Slots whose value
/// is already the observed handle are left alone.
pub(crate) fn observe_slots(target: &Object, interceptor: &Interceptor) -> Result<(), ObserveError> {
    for key in target.keys() {
        let Some(prop) = target.get_own_property(&key) else {
            continue;
        };
        if !classify::is_descriptor_observable(&prop.to_descriptor(), &key, interceptor.options()) {
            continue;
        }
        let Some(value) = prop.value().cloned() else {
            continue;
        };
        let observed = interceptor.observe_nested(value.clone());
        if observed != value {
            target.define_property(key, PropertyDescriptor::data(observed))?;
        }
    }
    Ok(())
}
