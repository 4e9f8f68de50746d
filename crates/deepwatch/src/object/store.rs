#![forbid(unsafe_code)]

//! Own-property storage and native definition rules.
//!
//! # Invariants
//!
//! 1. Own keys enumerate as: indices ascending, then `length` (arrays), then
//!    names in insertion order.
//! 2. For arrays, every stored index is `< length`.
//! 3. A refused definition or deletion leaves the store untouched, except
//!    for a partially applied `length` shrink, which stops at the first
//!    non-configurable element (and reports the refusal).

use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Class;
use super::descriptor::{Property, PropertyDescriptor, Slot};
use crate::error::Rejection;
use crate::value::{Key, Value};

#[derive(Debug, Clone, Copy)]
struct ArrayLength {
    value: u32,
    writable: bool,
}

pub(crate) struct Store {
    class: Class,
    indexed: BTreeMap<u32, Property>,
    named: IndexMap<Rc<str>, Property>,
    extensible: bool,
    length: Option<ArrayLength>,
}

impl Store {
    pub(crate) fn new(class: Class) -> Self {
        let length = matches!(class, Class::Array).then_some(ArrayLength {
            value: 0,
            writable: true,
        });
        Self {
            class,
            indexed: BTreeMap::new(),
            named: IndexMap::new(),
            extensible: true,
            length,
        }
    }

    pub(crate) fn class(&self) -> &Class {
        &self.class
    }

    pub(crate) fn is_array(&self) -> bool {
        self.length.is_some()
    }

    pub(crate) fn array_len(&self) -> Option<u32> {
        self.length.map(|l| l.value)
    }

    pub(crate) fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub(crate) fn get_own(&self, key: &Key) -> Option<Property> {
        match key {
            Key::Index(i) => self.indexed.get(i).cloned(),
            Key::Name(_) if key.is_length() && self.length.is_some() => {
                self.length.map(|len| Property {
                    slot: Slot::Data {
                        value: Value::from(len.value),
                        writable: len.writable,
                    },
                    enumerable: false,
                    configurable: false,
                })
            }
            Key::Name(name) => self.named.get(name).cloned(),
        }
    }

    pub(crate) fn has_own(&self, key: &Key) -> bool {
        match key {
            Key::Index(i) => self.indexed.contains_key(i),
            Key::Name(_) if key.is_length() && self.length.is_some() => true,
            Key::Name(name) => self.named.contains_key(name),
        }
    }

    pub(crate) fn own_keys(&self) -> Vec<Key> {
        let mut keys = Vec::with_capacity(self.indexed.len() + self.named.len() + 1);
        keys.extend(self.indexed.keys().map(|i| Key::Index(*i)));
        if self.length.is_some() {
            keys.push(Key::length());
        }
        keys.extend(self.named.keys().map(|n| Key::Name(Rc::clone(n))));
        keys
    }

    /// Number of own enumerable properties.
    pub(crate) fn enumerable_count(&self) -> usize {
        self.indexed
            .values()
            .chain(self.named.values())
            .filter(|p| p.enumerable)
            .count()
    }

    /// Insert or overwrite a plain data slot without validation.
    pub(crate) fn insert(&mut self, key: Key, value: Value) {
        if key.is_length() && self.length.is_some() {
            // Invalid lengths are dropped; there is no slot to overwrite.
            let _ = self.define_length(PropertyDescriptor::data(value));
            return;
        }
        if let (Key::Index(i), Some(len)) = (&key, self.length.as_mut())
            && *i >= len.value
        {
            // Past the largest array index: no length can cover it.
            let Some(grown) = i.checked_add(1) else {
                return;
            };
            len.value = grown;
        }
        match key {
            Key::Index(i) => {
                self.indexed.insert(i, Property::plain(value));
            }
            Key::Name(name) => {
                self.named.insert(name, Property::plain(value));
            }
        }
    }

    pub(crate) fn define(&mut self, key: &Key, desc: PropertyDescriptor) -> Result<(), Rejection> {
        let Some(len) = self.length else {
            return self.define_ordinary(key, desc);
        };
        if key.is_length() {
            return self.define_length(desc);
        }
        match key {
            Key::Index(i) if *i >= len.value => {
                let grown = i.checked_add(1).ok_or(Rejection::InvalidLength)?;
                if !len.writable {
                    return Err(Rejection::NonWritable);
                }
                self.define_ordinary(key, desc)?;
                if let Some(len) = self.length.as_mut() {
                    len.value = grown;
                }
                Ok(())
            }
            _ => self.define_ordinary(key, desc),
        }
    }

    /// `Ok(true)` when a slot was removed, `Ok(false)` when there was none.
    pub(crate) fn delete(&mut self, key: &Key) -> Result<bool, Rejection> {
        if key.is_length() && self.length.is_some() {
            return Err(Rejection::NonConfigurable);
        }
        let configurable = match self.get_slot(key) {
            None => return Ok(false),
            Some(prop) => prop.configurable,
        };
        if !configurable {
            return Err(Rejection::NonConfigurable);
        }
        match key {
            Key::Index(i) => {
                self.indexed.remove(i);
            }
            Key::Name(name) => {
                self.named.shift_remove(name);
            }
        }
        Ok(true)
    }

    pub(crate) fn prevent_extensions(&mut self) {
        self.extensible = false;
    }

    pub(crate) fn freeze(&mut self) {
        self.extensible = false;
        for prop in self.indexed.values_mut().chain(self.named.values_mut()) {
            prop.configurable = false;
            if let Slot::Data { writable, .. } = &mut prop.slot {
                *writable = false;
            }
        }
        if let Some(len) = self.length.as_mut() {
            len.writable = false;
        }
    }

    pub(crate) fn is_frozen(&self) -> bool {
        !self.extensible
            && self.length.is_none_or(|l| !l.writable)
            && self
                .indexed
                .values()
                .chain(self.named.values())
                .all(|p| !p.configurable && !p.writable())
    }

    fn get_slot(&self, key: &Key) -> Option<&Property> {
        match key {
            Key::Index(i) => self.indexed.get(i),
            Key::Name(name) => self.named.get(name),
        }
    }

    fn get_slot_mut(&mut self, key: &Key) -> Option<&mut Property> {
        match key {
            Key::Index(i) => self.indexed.get_mut(i),
            Key::Name(name) => self.named.get_mut(name),
        }
    }

    fn define_ordinary(&mut self, key: &Key, desc: PropertyDescriptor) -> Result<(), Rejection> {
        let extensible = self.extensible;
        match self.get_slot_mut(key) {
            Some(current) => {
                validate(current, &desc)?;
                apply(current, desc);
                Ok(())
            }
            None if !extensible => Err(Rejection::NotExtensible),
            None => {
                let prop = Property::from_descriptor(desc);
                match key {
                    Key::Index(i) => {
                        self.indexed.insert(*i, prop);
                    }
                    Key::Name(name) => {
                        self.named.insert(Rc::clone(name), prop);
                    }
                }
                Ok(())
            }
        }
    }

    fn define_length(&mut self, desc: PropertyDescriptor) -> Result<(), Rejection> {
        let Some(len) = self.length else {
            return Err(Rejection::InvalidLength);
        };
        if desc.is_accessor()
            || desc.configurable() == Some(true)
            || desc.enumerable() == Some(true)
        {
            return Err(Rejection::NonConfigurable);
        }
        if desc.writable() == Some(true) && !len.writable {
            return Err(Rejection::NonWritable);
        }
        let lock = desc.writable() == Some(false);
        let Some(value) = desc.value() else {
            if lock && let Some(len) = self.length.as_mut() {
                len.writable = false;
            }
            return Ok(());
        };
        let new_len = value
            .as_number()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n < f64::from(u32::MAX))
            .ok_or(Rejection::InvalidLength)? as u32;
        if new_len != len.value && !len.writable {
            return Err(Rejection::NonWritable);
        }
        if new_len < len.value {
            let doomed: Vec<u32> = self.indexed.range(new_len..).map(|(i, _)| *i).collect();
            for i in doomed.into_iter().rev() {
                let configurable = self.indexed.get(&i).is_some_and(|p| p.configurable);
                if !configurable {
                    if let Some(len) = self.length.as_mut() {
                        len.value = i + 1;
                        len.writable &= !lock;
                    }
                    return Err(Rejection::NonConfigurable);
                }
                self.indexed.remove(&i);
            }
        }
        if let Some(len) = self.length.as_mut() {
            len.value = new_len;
            len.writable &= !lock;
        }
        Ok(())
    }
}

fn same_callback<T: ?Sized>(a: Option<&Rc<T>>, b: Option<&Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

fn validate(current: &Property, desc: &PropertyDescriptor) -> Result<(), Rejection> {
    if current.configurable {
        return Ok(());
    }
    if desc.configurable() == Some(true) {
        return Err(Rejection::NonConfigurable);
    }
    if desc.enumerable().is_some_and(|e| e != current.enumerable) {
        return Err(Rejection::NonConfigurable);
    }
    match &current.slot {
        Slot::Data { value, writable } => {
            if desc.is_accessor() {
                return Err(Rejection::NonConfigurable);
            }
            if !writable {
                if desc.writable() == Some(true) {
                    return Err(Rejection::NonWritable);
                }
                if desc.value().is_some_and(|v| v != value) {
                    return Err(Rejection::NonWritable);
                }
            }
        }
        Slot::Accessor { get, set } => {
            if desc.is_data() {
                return Err(Rejection::NonConfigurable);
            }
            if desc.getter().is_some() && !same_callback(desc.getter(), get.as_ref()) {
                return Err(Rejection::NonConfigurable);
            }
            if desc.setter().is_some() && !same_callback(desc.setter(), set.as_ref()) {
                return Err(Rejection::NonConfigurable);
            }
        }
    }
    Ok(())
}

fn apply(current: &mut Property, desc: PropertyDescriptor) {
    if let Some(enumerable) = desc.enumerable() {
        current.enumerable = enumerable;
    }
    if let Some(configurable) = desc.configurable() {
        current.configurable = configurable;
    }
    let to_accessor = desc.is_accessor() && current.is_data();
    let to_data = desc.is_data() && !current.is_data();
    if to_accessor {
        current.slot = Slot::Accessor {
            get: desc.getter().cloned(),
            set: desc.setter().cloned(),
        };
        return;
    }
    if to_data {
        current.slot = Slot::Data {
            value: desc.value().cloned().unwrap_or_default(),
            writable: desc.writable().unwrap_or(false),
        };
        return;
    }
    match &mut current.slot {
        Slot::Data { value, writable } => {
            if let Some(v) = desc.value() {
                *value = v.clone();
            }
            if let Some(w) = desc.writable() {
                *writable = w;
            }
        }
        Slot::Accessor { get, set } => {
            if let Some(g) = desc.getter() {
                *get = Some(Rc::clone(g));
            }
            if let Some(s) = desc.setter() {
                *set = Some(Rc::clone(s));
            }
        }
    }
}
