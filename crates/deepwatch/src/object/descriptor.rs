#![forbid(unsafe_code)]

//! Stored properties and partial property descriptors.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Accessor getter.
pub type Getter = Rc<dyn Fn() -> Value>;
/// Accessor setter.
pub type Setter = Rc<dyn Fn(Value)>;

/// Storage of a single property.
#[derive(Clone)]
pub enum Slot {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Getter>, set: Option<Setter> },
}

/// A complete, stored property.
#[derive(Clone)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Data property with every attribute set, as created by assignment.
    #[must_use]
    pub fn plain(value: Value) -> Self {
        Self {
            slot: Slot::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Build a new property from a descriptor, defaulting absent attributes
    /// to `false` and an absent value to `undefined`.
    pub(crate) fn from_descriptor(desc: PropertyDescriptor) -> Self {
        let slot = if desc.is_accessor() {
            Slot::Accessor {
                get: desc.get,
                set: desc.set,
            }
        } else {
            Slot::Data {
                value: desc.value.unwrap_or_default(),
                writable: desc.writable.unwrap_or(false),
            }
        };
        Self {
            slot,
            enumerable: desc.enumerable.unwrap_or(false),
            configurable: desc.configurable.unwrap_or(false),
        }
    }

    /// The stored value of a data property.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data { value, .. } => Some(value),
            Slot::Accessor { .. } => None,
        }
    }

    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self.slot, Slot::Data { .. })
    }

    /// Whether the value can be replaced. Always false for accessors.
    #[must_use]
    pub fn writable(&self) -> bool {
        matches!(self.slot, Slot::Data { writable: true, .. })
    }

    /// Complete descriptor describing this property.
    #[must_use]
    pub fn to_descriptor(&self) -> PropertyDescriptor {
        let base = PropertyDescriptor::new()
            .with_enumerable(self.enumerable)
            .with_configurable(self.configurable);
        match &self.slot {
            Slot::Data { value, writable } => {
                base.with_value(value.clone()).with_writable(*writable)
            }
            Slot::Accessor { get, set } => PropertyDescriptor {
                get: get.clone(),
                set: set.clone(),
                ..base
            },
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Property");
        match &self.slot {
            Slot::Data { value, writable } => {
                s.field("value", value).field("writable", writable);
            }
            Slot::Accessor { get, set } => {
                s.field("get", &get.is_some()).field("set", &set.is_some());
            }
        }
        s.field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}

/// A partial property description used to define or redefine a slot.
///
/// Absent fields leave an existing slot's attribute unchanged; on a new slot
/// they default to `false` (or `undefined` for the value).
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    value: Option<Value>,
    writable: Option<bool>,
    get: Option<Getter>,
    set: Option<Setter>,
    enumerable: Option<bool>,
    configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor carrying only a value.
    #[must_use]
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Writable, enumerable, configurable data descriptor.
    #[must_use]
    pub fn plain(value: impl Into<Value>) -> Self {
        Self::data(value)
            .with_writable(true)
            .with_enumerable(true)
            .with_configurable(true)
    }

    /// Accessor descriptor.
    #[must_use]
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            get,
            set,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    #[must_use]
    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    #[must_use]
    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn writable(&self) -> Option<bool> {
        self.writable
    }

    #[must_use]
    pub fn enumerable(&self) -> Option<bool> {
        self.enumerable
    }

    #[must_use]
    pub fn configurable(&self) -> Option<bool> {
        self.configurable
    }

    #[must_use]
    pub fn getter(&self) -> Option<&Getter> {
        self.get.as_ref()
    }

    #[must_use]
    pub fn setter(&self) -> Option<&Setter> {
        self.set.as_ref()
    }

    /// Has a getter or setter.
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Has a value or a writable flag.
    #[must_use]
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("value", &self.value)
            .field("writable", &self.writable)
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}
