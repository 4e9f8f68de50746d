#![forbid(unsafe_code)]

//! Error types for observation, native mutation, and dispatch.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Scalar observed | `observe(42)` | [`ObserveError::NotObservable`] |
//! | Collection without patch | `observe(map)` with `patch = false` | [`ObserveError::PatchRequired`] |
//! | Hub lookup miss | `get(v)` on an unobserved value | [`ObserveError::NotObserved`] |
//! | Slot refused | frozen object, non-writable slot, ... | [`ObserveError::Rejected`], nothing dispatched |
//! | Listener failed | a listener returned `Err` | [`ObserveError::Dispatch`], mutation already applied |

use std::fmt;

use crate::value::Key;

/// Error returned by a listener. Listeners may fail with any error type.
pub type ListenerError = Box<dyn std::error::Error + 'static>;

/// Why a container refused a definition, assignment, or deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The container does not accept new slots.
    NotExtensible,
    /// The slot cannot be reconfigured or deleted.
    NonConfigurable,
    /// The slot's value cannot be replaced.
    NonWritable,
    /// The slot is an accessor without a setter.
    NoSetter,
    /// An array `length` that is not a valid array length.
    InvalidLength,
}

impl Rejection {
    /// Short machine-friendly label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotExtensible => "not-extensible",
            Self::NonConfigurable => "non-configurable",
            Self::NonWritable => "non-writable",
            Self::NoSetter => "no-setter",
            Self::InvalidLength => "invalid-length",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All listener failures collected during one dispatch pass.
///
/// Every listener runs even when an earlier one fails; the failures are
/// reported together once the pass (including any parent relay) is done.
#[derive(Debug)]
pub struct DispatchError {
    failures: Vec<ListenerError>,
}

impl DispatchError {
    pub(crate) fn new(failures: Vec<ListenerError>) -> Self {
        Self { failures }
    }

    /// The individual listener errors, in listener order.
    #[must_use]
    pub fn failures(&self) -> &[ListenerError] {
        &self.failures
    }

    /// Number of listeners that failed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false for a constructed error; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Combine two dispatch outcomes, keeping every failure.
    pub(crate) fn merge(first: Result<(), Self>, second: Result<(), Self>) -> Result<(), Self> {
        match (first, second) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(mut a), Err(b)) => {
                a.failures.extend(b.failures);
                Err(a)
            }
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.first() {
            Some(first) if self.failures.len() == 1 => write!(f, "listener failed: {first}"),
            Some(first) => write!(
                f,
                "{} listeners failed (first: {first})",
                self.failures.len()
            ),
            None => f.write_str("dispatch failed"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures.first().map(|e| e.as_ref() as _)
    }
}

/// Errors from observation and from mutations made through observed handles.
#[derive(Debug)]
pub enum ObserveError {
    /// The value is a scalar or an opaque built-in (e.g. a date).
    NotObservable { kind: &'static str },
    /// Hash collections are only observed with the `patch` option.
    PatchRequired { kind: &'static str },
    /// No hub is registered for the value.
    NotObserved,
    /// The underlying container refused the mutation.
    Rejected { key: Key, reason: Rejection },
    /// An array operation was called on a non-array object.
    NotAnArray,
    /// Weak collections only accept composite keys.
    InvalidWeakKey { kind: &'static str },
    /// The mutation was applied, but one or more listeners failed.
    Dispatch(DispatchError),
}

impl ObserveError {
    pub(crate) fn rejected(key: Key, reason: Rejection) -> Self {
        Self::Rejected { key, reason }
    }

    /// The rejection reason, if this is a native refusal.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for ObserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotObservable { kind } => write!(f, "value of kind '{kind}' is not observable"),
            Self::PatchRequired { kind } => {
                write!(f, "{kind} can only be observed with the patch option")
            }
            Self::NotObserved => f.write_str("value is not observed"),
            Self::Rejected { key, reason } => write!(f, "mutation of '{key}' rejected: {reason}"),
            Self::NotAnArray => f.write_str("array operation on a non-array object"),
            Self::InvalidWeakKey { kind } => {
                write!(f, "value of kind '{kind}' cannot be used as a weak key")
            }
            Self::Dispatch(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ObserveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dispatch(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DispatchError> for ObserveError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}
