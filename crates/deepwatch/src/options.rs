#![forbid(unsafe_code)]

//! Observation options.

use std::fmt;
use std::rc::Rc;

use crate::value::{Key, Value};

/// Predicate excluding a slot from deep observation.
pub type IgnoreFn = Rc<dyn Fn(&Key, &Value) -> bool>;

/// Configuration for [`observe_with`](crate::observe_with).
///
/// Options are fixed at the first observation of a value and threaded
/// unchanged through every nested observation it triggers.
#[derive(Clone)]
pub struct ObserveOptions {
    /// Recursively observe nested observable values. Default `true`.
    pub deep: bool,
    /// Instrument hash collections in place. Default `false`.
    pub patch: bool,
    /// Slots for which this returns `true` are not deep-observed. Hash
    /// collections are exempt when `patch` is on.
    pub ignore: Option<IgnoreFn>,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            deep: true,
            patch: false,
            ignore: None,
        }
    }
}

impl ObserveOptions {
    /// Only the top-level container is intercepted.
    #[must_use]
    pub fn shallow() -> Self {
        Self {
            deep: false,
            ..Default::default()
        }
    }

    /// Deep observation with hash-collection patching.
    #[must_use]
    pub fn patched() -> Self {
        Self {
            patch: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    #[must_use]
    pub fn with_patch(mut self, patch: bool) -> Self {
        self.patch = patch;
        self
    }

    #[must_use]
    pub fn with_ignore(mut self, ignore: impl Fn(&Key, &Value) -> bool + 'static) -> Self {
        self.ignore = Some(Rc::new(ignore));
        self
    }

    /// Whether the `ignore` predicate excludes this slot.
    #[must_use]
    pub fn is_ignored(&self, key: &Key, value: &Value) -> bool {
        self.ignore.as_ref().is_some_and(|ignore| ignore(key, value))
    }
}

impl fmt::Debug for ObserveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserveOptions")
            .field("deep", &self.deep)
            .field("patch", &self.patch)
            .field("ignore", &self.ignore.is_some())
            .finish()
    }
}
