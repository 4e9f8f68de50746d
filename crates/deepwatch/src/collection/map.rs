#![forbid(unsafe_code)]

//! Insertion-ordered map keyed by [`Value`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use super::{PatchSlot, stored_form};
use crate::change::{Change, ChangeKey};
use crate::error::ObserveError;
use crate::intercept::Interceptor;
use crate::value::{Identity, Value};

pub(crate) struct MapCell {
    entries: RefCell<IndexMap<Value, Value>>,
    patch: PatchSlot,
}

impl MapCell {
    fn new(entries: IndexMap<Value, Value>) -> Self {
        Self {
            entries: RefCell::new(entries),
            patch: PatchSlot::default(),
        }
    }
}

/// Map-like collection with SameValueZero keys, iterated in insertion order.
///
/// Cloning a `Map` creates a new handle to the **same** map.
#[derive(Clone)]
pub struct Map(pub(crate) Rc<MapCell>);

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(MapCell::new(IndexMap::new())))
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        entries.into_iter().fold(Self::new(), |map, (k, v)| map.with(k, v))
    }

    /// Builder-style native insert. Never intercepted.
    #[must_use]
    pub fn with(self, key: impl Into<Value>, value: impl Into<Value>) -> Self {
        self.0.entries.borrow_mut().insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this instance runs the instrumented methods.
    #[must_use]
    pub fn is_patched(&self) -> bool {
        self.0.patch.is_installed()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, key: &Value) -> bool {
        self.0.entries.borrow().contains_key(key)
    }

    fn stored_key(&self, key: &Value, interceptor: Option<&Interceptor>) -> Option<Value> {
        stored_form(key, interceptor, |k| self.contains(k))
    }

    #[must_use]
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let stored = self.stored_key(&key, self.0.patch.get().as_deref())?;
        self.0.entries.borrow().get(&stored).cloned()
    }

    #[must_use]
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        self.stored_key(&key, self.0.patch.get().as_deref()).is_some()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.0.entries.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.0.entries.borrow().values().cloned().collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Insert or replace an entry.
    ///
    /// When patched, a new key and the value are observed first, then `add`
    /// or `set` (with `old`) is dispatched; replacing a value with a strictly
    /// equal one dispatches nothing.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<&Self, ObserveError> {
        let key = key.into();
        let value = value.into();
        let Some(interceptor) = self.0.patch.get() else {
            self.0.entries.borrow_mut().insert(key, value);
            return Ok(self);
        };

        let (key, old) = match self.stored_key(&key, Some(&*interceptor)) {
            Some(stored) => {
                let old = self.0.entries.borrow().get(&stored).cloned();
                (stored, old)
            }
            None => (interceptor.observe_entry(key), None),
        };
        let value = interceptor.observe_entry(value);
        self.0.entries.borrow_mut().insert(key.clone(), value.clone());

        let change = match old {
            Some(old) if old.strict_eq(&value) => return Ok(self),
            Some(old) => Change::set(self, ChangeKey::Entry(key), value, old),
            None => Change::add(self, Some(ChangeKey::Entry(key)), value),
        };
        interceptor.notify(&change)?;
        Ok(self)
    }

    /// Remove an entry. `Ok(false)` when the key was absent.
    pub fn delete(&self, key: impl Into<Value>) -> Result<bool, ObserveError> {
        let key = key.into();
        let Some(interceptor) = self.0.patch.get() else {
            return Ok(self.0.entries.borrow_mut().shift_remove(&key).is_some());
        };
        let Some(stored) = self.stored_key(&key, Some(&*interceptor)) else {
            return Ok(false);
        };
        let Some(old) = self.0.entries.borrow_mut().shift_remove(&stored) else {
            return Ok(false);
        };
        interceptor.notify(&Change::delete(self, Some(ChangeKey::Entry(stored)), old))?;
        Ok(true)
    }

    /// Remove every entry. When patched and non-empty, dispatches one
    /// `clear` carrying an unobserved snapshot of the former entries.
    pub fn clear(&self) -> Result<(), ObserveError> {
        if self.is_empty() {
            return Ok(());
        }
        let previous = std::mem::take(&mut *self.0.entries.borrow_mut());
        if let Some(interceptor) = self.0.patch.get() {
            let snapshot = Self(Rc::new(MapCell::new(previous)));
            interceptor.notify(&Change::clear(self, snapshot))?;
        }
        Ok(())
    }

    /// Install the interceptor; with `deep`, pre-existing entries are
    /// observed in place, keeping their order and dispatching nothing.
    pub(crate) fn install(&self, interceptor: Rc<Interceptor>) {
        self.0.patch.install(Rc::clone(&interceptor));
        debug!(kind = "map", entries = self.len(), "patched collection");
        if !interceptor.options().deep {
            return;
        }
        let existing = std::mem::take(&mut *self.0.entries.borrow_mut());
        for (key, value) in existing {
            let key = interceptor.observe_entry(key);
            let value = interceptor.observe_entry(value);
            self.0.entries.borrow_mut().insert(key, value);
        }
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Map {}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Map");
        s.field("identity", &self.identity())
            .field("patched", &self.is_patched());
        if let Ok(entries) = self.0.entries.try_borrow() {
            s.field("len", &entries.len());
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::hub::Listener;
    use crate::object::Object;
    use crate::options::ObserveOptions;
    use crate::registry::Registry;

    fn patched(registry: &Registry, map: &Map) -> Rc<RefCell<Vec<Change>>> {
        registry
            .observe_with(map, &ObserveOptions::patched())
            .unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        registry
            .get(&Value::from(map))
            .unwrap()
            .subscribe(&Listener::new(move |change, _| sink.borrow_mut().push(change.clone())));
        log
    }

    #[test]
    fn native_operations() {
        let map = Map::from_entries([("a", 1), ("b", 2)]);
        assert_eq!(map.get("a"), Some(Value::from(1)));
        assert!(map.has("b"));
        map.set("a", 3).unwrap();
        assert_eq!(map.keys(), vec![Value::from("a"), Value::from("b")]);
        assert!(map.delete("a").unwrap());
        assert!(!map.delete("a").unwrap());
        map.clear().unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn patched_add_set_delete() {
        let registry = Registry::new();
        let map = Map::new();
        let log = patched(&registry, &map);

        map.set("k", 1).unwrap();
        map.set("k", 1).unwrap();
        map.set("k", 2).unwrap();
        assert!(map.delete("k").unwrap());
        assert!(!map.delete("k").unwrap());

        let kinds: Vec<_> = log.borrow().iter().map(Change::kind).collect();
        assert_eq!(kinds, [ChangeKind::Add, ChangeKind::Set, ChangeKind::Delete]);
        let log = log.borrow();
        assert_eq!(log[1].old(), Some(&Value::from(1)));
        assert_eq!(log[1].entry_key(), Some(&Value::from("k")));
        assert_eq!(log[2].old(), Some(&Value::from(2)));
        assert_eq!(log[0].target(), &Value::from(&map));
    }

    #[test]
    fn nan_over_nan_is_a_set() {
        let registry = Registry::new();
        let map = Map::from_entries([("n", f64::NAN)]);
        let log = patched(&registry, &map);

        map.set("n", f64::NAN).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind(), ChangeKind::Set);
        // Still one entry: membership is SameValueZero.
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn clear_snapshot() {
        let registry = Registry::new();
        let map = Map::from_entries([("a", 1), ("b", 2)]);
        let log = patched(&registry, &map);

        map.clear().unwrap();
        map.clear().unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        let snapshot = log[0].old().and_then(Value::as_map).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.ptr_eq(&map));
        assert!(!snapshot.is_patched());
    }

    #[test]
    fn install_observes_existing_entries_in_order() {
        let registry = Registry::new();
        let key = Object::new();
        let value = Object::new();
        let map = Map::new().with("first", 1).with(&key, &value);
        let log = patched(&registry, &map);

        assert!(log.borrow().is_empty());
        let keys = map.keys();
        assert_eq!(keys[0], Value::from("first"));
        assert!(keys[1].as_object().unwrap().is_facade());
        // Raw key still finds the entry.
        let stored = map.get(&key).unwrap();
        assert!(stored.as_object().unwrap().raw().ptr_eq(&value));
        assert!(map.has(&key));
    }

    #[test]
    fn nested_values_relay_to_map() {
        let registry = Registry::new();
        let map = Map::new();
        let log = patched(&registry, &map);

        map.set("child", Object::new()).unwrap();
        let child = map.get("child").unwrap();
        child.as_object().unwrap().set("x", 1).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].property().map(ToString::to_string), Some("x".into()));
        assert_eq!(log[1].target(), &child);
    }

    #[test]
    fn other_instances_unaffected() {
        let registry = Registry::new();
        let observed = Map::new();
        let log = patched(&registry, &observed);
        let plain = Map::new();
        plain.set("a", Object::new()).unwrap();
        assert!(!plain.is_patched());
        assert!(!plain.get("a").unwrap().as_object().unwrap().is_facade());
        assert!(log.borrow().is_empty());
    }
}
