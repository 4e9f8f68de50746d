#![forbid(unsafe_code)]

//! Dynamic value model.
//!
//! # Design
//!
//! [`Value`] is a small dynamically-typed value: a handful of scalars plus
//! reference handles to composite containers ([`Object`], [`Map`], [`Set`],
//! [`WeakMap`], [`WeakSet`]). Cloning a composite handle clones the
//! reference, never the contents.
//!
//! # Invariants
//!
//! 1. Equality is SameValueZero: scalars compare by value (`NaN` equals
//!    `NaN`, `+0` equals `-0`), composites compare by [`Identity`].
//! 2. `Hash` agrees with equality, so values can key hash collections.
//! 3. An [`Identity`] is stable for as long as any strong or weak handle to
//!    the container exists (the allocation cannot be reused before that).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::time::SystemTime;

use crate::collection::{Map, MapCell, Set, SetCell, WeakMap, WeakMapCell, WeakSet, WeakSetCell};
use crate::object::{Object, ObjectCell};

/// Address-based identity of a composite container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(usize);

impl Identity {
    pub(crate) fn of<T>(rc: &Rc<T>) -> Self {
        Self(Rc::as_ptr(rc).cast::<()>() as usize)
    }

    pub(crate) fn of_weak<T>(weak: &Weak<T>) -> Self {
        Self(weak.as_ptr().cast::<()>() as usize)
    }
}

/// A dynamically-typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Opaque timestamp. Never observable.
    Date(SystemTime),
    Object(Object),
    Map(Map),
    Set(Set),
    WeakMap(WeakMap),
    WeakSet(WeakSet),
}

impl Value {
    /// Kind name used in errors and logs.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Object(o) if o.is_array() => "array",
            Self::Object(_) => "object",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::WeakMap(_) => "weakmap",
            Self::WeakSet(_) => "weakset",
        }
    }

    /// Whether this is a reference to a container.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.identity().is_some()
    }

    /// Identity of the referenced container, `None` for scalars.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::Object(o) => Some(o.identity()),
            Self::Map(m) => Some(m.identity()),
            Self::Set(s) => Some(s.identity()),
            Self::WeakMap(m) => Some(m.identity()),
            Self::WeakSet(s) => Some(s.identity()),
            _ => None,
        }
    }

    /// Weak handle to the referenced container, `None` for scalars.
    #[must_use]
    pub fn downgrade(&self) -> Option<WeakValue> {
        let repr = match self {
            Self::Object(o) => WeakRepr::Object(Rc::downgrade(&o.0)),
            Self::Map(m) => WeakRepr::Map(Rc::downgrade(&m.0)),
            Self::Set(s) => WeakRepr::Set(Rc::downgrade(&s.0)),
            Self::WeakMap(m) => WeakRepr::WeakMap(Rc::downgrade(&m.0)),
            Self::WeakSet(s) => WeakRepr::WeakSet(Rc::downgrade(&s.0)),
            _ => return None,
        };
        Some(WeakValue(repr))
    }

    /// Strict equality, the test change detection uses: like `==` except
    /// that `NaN` differs from itself.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => self == other,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_object(self) -> Option<Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_weak_map(&self) -> Option<&WeakMap> {
        match self {
            Self::WeakMap(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_weak_set(&self) -> Option<&WeakSet> {
        match self {
            Self::WeakSet(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Undefined | Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Number(n) => {
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0.0f64.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Self::String(s) => s.hash(state),
            Self::Date(d) => d.hash(state),
            composite => composite.identity().hash(state),
        }
    }
}

// Shallow: observed graphs may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Date(d) => write!(f, "Date({d:?})"),
            Self::Object(o) => fmt::Debug::fmt(o, f),
            Self::Map(m) => fmt::Debug::fmt(m, f),
            Self::Set(s) => fmt::Debug::fmt(s, f),
            Self::WeakMap(m) => fmt::Debug::fmt(m, f),
            Self::WeakSet(s) => fmt::Debug::fmt(s, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::String(s)
    }
}

impl From<SystemTime> for Value {
    fn from(d: SystemTime) -> Self {
        Self::Date(d)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Self::Object(o.clone())
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Self::Map(m)
    }
}

impl From<&Map> for Value {
    fn from(m: &Map) -> Self {
        Self::Map(m.clone())
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        Self::Set(s)
    }
}

impl From<&Set> for Value {
    fn from(s: &Set) -> Self {
        Self::Set(s.clone())
    }
}

impl From<WeakMap> for Value {
    fn from(m: WeakMap) -> Self {
        Self::WeakMap(m)
    }
}

impl From<&WeakMap> for Value {
    fn from(m: &WeakMap) -> Self {
        Self::WeakMap(m.clone())
    }
}

impl From<WeakSet> for Value {
    fn from(s: WeakSet) -> Self {
        Self::WeakSet(s)
    }
}

impl From<&WeakSet> for Value {
    fn from(s: &WeakSet) -> Self {
        Self::WeakSet(s.clone())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

/// Weak counterpart of a composite [`Value`].
#[derive(Clone)]
pub struct WeakValue(WeakRepr);

#[derive(Clone)]
enum WeakRepr {
    Object(Weak<ObjectCell>),
    Map(Weak<MapCell>),
    Set(Weak<SetCell>),
    WeakMap(Weak<WeakMapCell>),
    WeakSet(Weak<WeakSetCell>),
}

impl WeakValue {
    /// Strong handle, if the container is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Value> {
        match &self.0 {
            WeakRepr::Object(w) => w.upgrade().map(|rc| Value::Object(Object(rc))),
            WeakRepr::Map(w) => w.upgrade().map(|rc| Value::Map(Map(rc))),
            WeakRepr::Set(w) => w.upgrade().map(|rc| Value::Set(Set(rc))),
            WeakRepr::WeakMap(w) => w.upgrade().map(|rc| Value::WeakMap(WeakMap(rc))),
            WeakRepr::WeakSet(w) => w.upgrade().map(|rc| Value::WeakSet(WeakSet(rc))),
        }
    }

    /// Whether the container is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match &self.0 {
            WeakRepr::Object(w) => w.strong_count() > 0,
            WeakRepr::Map(w) => w.strong_count() > 0,
            WeakRepr::Set(w) => w.strong_count() > 0,
            WeakRepr::WeakMap(w) => w.strong_count() > 0,
            WeakRepr::WeakSet(w) => w.strong_count() > 0,
        }
    }

    /// Identity of the referenced container (stable while this handle lives).
    #[must_use]
    pub fn identity(&self) -> Identity {
        match &self.0 {
            WeakRepr::Object(w) => Identity::of_weak(w),
            WeakRepr::Map(w) => Identity::of_weak(w),
            WeakRepr::Set(w) => Identity::of_weak(w),
            WeakRepr::WeakMap(w) => Identity::of_weak(w),
            WeakRepr::WeakSet(w) => Identity::of_weak(w),
        }
    }
}

impl fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakValue")
            .field("identity", &self.identity())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Property key of a keyed container.
///
/// Canonical array indices (`"0"`, `"17"`, but not `"007"`) are stored as
/// [`Key::Index`]; everything else is a [`Key::Name`]. Both spellings of an
/// index are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Index(u32),
    Name(Rc<str>),
}

impl Key {
    /// The array `length` key.
    #[must_use]
    pub fn length() -> Self {
        Self::Name(Rc::from("length"))
    }

    #[must_use]
    pub fn is_length(&self) -> bool {
        matches!(self, Self::Name(n) if &**n == "length")
    }

    #[must_use]
    pub fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Name(_) => None,
        }
    }

    fn parse_index(s: &str) -> Option<u32> {
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // u32::MAX itself is not a valid array index.
        s.parse::<u32>().ok().filter(|i| *i != u32::MAX)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(n) => f.write_str(n),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        match Self::parse_index(s) {
            Some(i) => Self::Index(i),
            None => Self::Name(Rc::from(s)),
        }
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

impl From<u32> for Key {
    fn from(i: u32) -> Self {
        if i == u32::MAX {
            Self::Name(Rc::from(i.to_string()))
        } else {
            Self::Index(i)
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        match u32::try_from(i) {
            Ok(i) => Self::from(i),
            Err(_) => Self::Name(Rc::from(i.to_string())),
        }
    }
}
