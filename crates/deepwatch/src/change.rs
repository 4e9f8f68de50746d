#![forbid(unsafe_code)]

//! Change descriptors: the unit of notification.

use std::fmt;

use crate::value::{Key, Value};

/// What happened to a slot or entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Set,
    Delete,
    Clear,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a change happened: a property of a keyed container, or an entry key
/// of a map-like collection. Set-like changes carry no key; the element is
/// the change's `value` (or `old`).
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKey {
    Property(Key),
    Entry(Value),
}

impl From<Key> for ChangeKey {
    fn from(key: Key) -> Self {
        Self::Property(key)
    }
}

/// Immutable record of one mutation.
///
/// `old` is present for `set`, `delete` and `clear` (where it is a snapshot
/// of the prior contents); `value` is present for `add` and `set`.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    kind: ChangeKind,
    key: Option<ChangeKey>,
    value: Option<Value>,
    old: Option<Value>,
    target: Value,
}

impl Change {
    /// A new slot or entry.
    #[must_use]
    pub fn add(target: impl Into<Value>, key: Option<ChangeKey>, value: impl Into<Value>) -> Self {
        Self {
            kind: ChangeKind::Add,
            key,
            value: Some(value.into()),
            old: None,
            target: target.into(),
        }
    }

    /// An existing slot or entry received a different value.
    #[must_use]
    pub fn set(
        target: impl Into<Value>,
        key: ChangeKey,
        value: impl Into<Value>,
        old: impl Into<Value>,
    ) -> Self {
        Self {
            kind: ChangeKind::Set,
            key: Some(key),
            value: Some(value.into()),
            old: Some(old.into()),
            target: target.into(),
        }
    }

    /// A slot or entry was removed.
    #[must_use]
    pub fn delete(target: impl Into<Value>, key: Option<ChangeKey>, old: impl Into<Value>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key,
            value: None,
            old: Some(old.into()),
            target: target.into(),
        }
    }

    /// A collection was emptied; `snapshot` holds its former contents.
    #[must_use]
    pub fn clear(target: impl Into<Value>, snapshot: impl Into<Value>) -> Self {
        Self {
            kind: ChangeKind::Clear,
            key: None,
            value: None,
            old: Some(snapshot.into()),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    #[must_use]
    pub fn key(&self) -> Option<&ChangeKey> {
        self.key.as_ref()
    }

    /// The property key, for changes on keyed containers.
    #[must_use]
    pub fn property(&self) -> Option<&Key> {
        match &self.key {
            Some(ChangeKey::Property(key)) => Some(key),
            _ => None,
        }
    }

    /// The entry key, for changes on map-like collections.
    #[must_use]
    pub fn entry_key(&self) -> Option<&Value> {
        match &self.key {
            Some(ChangeKey::Entry(key)) => Some(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn old(&self) -> Option<&Value> {
        self.old.as_ref()
    }

    /// The container the mutation happened on: the facade for keyed
    /// containers, the instance itself for collections.
    #[must_use]
    pub fn target(&self) -> &Value {
        &self.target
    }
}
