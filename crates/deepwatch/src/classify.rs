#![forbid(unsafe_code)]

//! Pure predicates deciding what gets observed.

use crate::object::PropertyDescriptor;
use crate::options::ObserveOptions;
use crate::value::{Key, Value};

/// Whether `value` is a composite that can be observed.
///
/// Scalars, `null`, `undefined` and dates are not.
#[must_use]
pub fn is_observable(value: &Value) -> bool {
    value.is_composite()
}

/// Whether `value` is a map-like or set-like collection, weak variants
/// included.
#[must_use]
pub fn is_hash_collection(value: &Value) -> bool {
    matches!(
        value,
        Value::Map(_) | Value::Set(_) | Value::WeakMap(_) | Value::WeakSet(_)
    )
}

/// Whether `value` is a weakly-keyed collection.
#[must_use]
pub fn is_weak_collection(value: &Value) -> bool {
    matches!(value, Value::WeakMap(_) | Value::WeakSet(_))
}

/// Whether a slot described by `desc` is eligible for deep observation.
///
/// The slot must be plain data holding an observable value and must be
/// writable or configurable so it can be redefined. Hash collections are
/// eligible exactly when `patch` is on, regardless of `ignore`; any other
/// value is eligible unless `ignore` excludes it. Absent attributes count as
/// `false`.
#[must_use]
pub fn is_descriptor_observable(
    desc: &PropertyDescriptor,
    key: &Key,
    options: &ObserveOptions,
) -> bool {
    if desc.is_accessor() {
        return false;
    }
    let Some(value) = desc.value() else {
        return false;
    };
    if !(desc.writable().unwrap_or(false) || desc.configurable().unwrap_or(false)) {
        return false;
    }
    if is_hash_collection(value) {
        return options.patch;
    }
    is_observable(value) && !options.is_ignored(key, value)
}

/// Whether a collection entry (value, or map key) is eligible for deep
/// observation. Entries carry no property key, so `ignore` does not apply.
pub(crate) fn is_entry_observable(value: &Value, options: &ObserveOptions) -> bool {
    if is_hash_collection(value) {
        return options.patch;
    }
    is_observable(value)
}
