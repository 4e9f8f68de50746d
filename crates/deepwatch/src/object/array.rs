#![forbid(unsafe_code)]

//! Array operations built on get/set/delete.
//!
//! Every operation is expressed as the same sequence of slot reads, writes
//! and deletions the classic array algorithms perform. Through a facade each
//! touched slot therefore surfaces as its own `add`/`set`/`delete` change;
//! a `reverse` of three elements is two `set`s, not one composite change.
//!
//! A failing listener never leaves an array half-rewritten: the remaining
//! slots are still written and the failures are reported at the end. A
//! refused write (frozen array, sealed slot) stops the operation where it
//! happened.

use std::cmp::Ordering;

use super::{Object, Store};
use crate::error::{DispatchError, ObserveError, Rejection};
use crate::value::{Key, Value};

fn length_error() -> ObserveError {
    ObserveError::rejected(Key::length(), Rejection::InvalidLength)
}

/// Listener failures held back until every slot write of an operation is
/// done. Any other error still stops the operation at once.
#[derive(Default)]
struct Deferred(Option<DispatchError>);

impl Deferred {
    fn absorb<T>(&mut self, result: Result<T, ObserveError>) -> Result<(), ObserveError> {
        match result {
            Ok(_) => Ok(()),
            Err(ObserveError::Dispatch(err)) => {
                let held = self.0.take().map_or(Ok(()), Err);
                self.0 = DispatchError::merge(held, Err(err)).err();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn finish<T>(self, value: T) -> Result<T, ObserveError> {
        match self.0 {
            Some(err) => Err(ObserveError::Dispatch(err)),
            None => Ok(value),
        }
    }
}

impl Object {
    fn array_length(&self) -> Result<u32, ObserveError> {
        self.with_store(Store::array_len)
            .ok_or(ObserveError::NotAnArray)
    }

    fn set_length(&self, len: u32) -> Result<(), ObserveError> {
        self.set(Key::length(), len)
    }

    /// Copy element `from` to `to`, or delete `to` when `from` is a hole.
    fn move_element(&self, from: u32, to: u32) -> Result<(), ObserveError> {
        if self.has_own(from) {
            self.set(to, self.get(from))
        } else {
            self.delete(to).map(|_| ())
        }
    }

    /// Elements `0..len`, holes read as `undefined`.
    pub fn to_vec(&self) -> Result<Vec<Value>, ObserveError> {
        let len = self.array_length()?;
        Ok((0..len).map(|i| self.get(i)).collect())
    }

    /// Append one element, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, ObserveError> {
        self.extend([value.into()])
    }

    /// Append elements in order, returning the new length.
    ///
    /// Listener failures do not stop the operation: every element is
    /// written, then the failures are returned together as
    /// [`ObserveError::Dispatch`].
    pub fn extend<V: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<usize, ObserveError> {
        let mut len = self.array_length()?;
        let mut deferred = Deferred::default();
        for value in values {
            deferred.absorb(self.set(len, value))?;
            len = len.checked_add(1).ok_or_else(length_error)?;
        }
        deferred.absorb(self.set_length(len))?;
        deferred.finish(len as usize)
    }

    /// Remove and return the last element (`undefined` when empty).
    pub fn pop(&self) -> Result<Value, ObserveError> {
        let len = self.array_length()?;
        if len == 0 {
            self.set_length(0)?;
            return Ok(Value::Undefined);
        }
        let last = len - 1;
        let value = self.get(last);
        let mut deferred = Deferred::default();
        deferred.absorb(self.delete(last))?;
        deferred.absorb(self.set_length(last))?;
        deferred.finish(value)
    }

    /// Remove and return the first element (`undefined` when empty).
    pub fn shift(&self) -> Result<Value, ObserveError> {
        let len = self.array_length()?;
        if len == 0 {
            self.set_length(0)?;
            return Ok(Value::Undefined);
        }
        let first = self.get(0u32);
        let mut deferred = Deferred::default();
        for k in 1..len {
            deferred.absorb(self.move_element(k, k - 1))?;
        }
        deferred.absorb(self.delete(len - 1))?;
        deferred.absorb(self.set_length(len - 1))?;
        deferred.finish(first)
    }

    /// Prepend elements, keeping their order. Returns the new length.
    pub fn unshift<V: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<usize, ObserveError> {
        let len = self.array_length()?;
        let items: Vec<Value> = values.into_iter().map(Into::into).collect();
        let count = u32::try_from(items.len()).map_err(|_| length_error())?;
        let new_len = len.checked_add(count).ok_or_else(length_error)?;
        let mut deferred = Deferred::default();
        if count > 0 {
            for k in (0..len).rev() {
                deferred.absorb(self.move_element(k, k + count))?;
            }
            for (j, item) in (0u32..).zip(items) {
                deferred.absorb(self.set(j, item))?;
            }
        }
        deferred.absorb(self.set_length(new_len))?;
        deferred.finish(new_len as usize)
    }

    /// Remove `delete_count` elements at `start` and insert `values` in their
    /// place. Returns the removed elements.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>, ObserveError> {
        let len = self.array_length()?;
        let start = u32::try_from(start).unwrap_or(u32::MAX).min(len);
        let delete_count = u32::try_from(delete_count)
            .unwrap_or(u32::MAX)
            .min(len - start);
        let items: Vec<Value> = values.into_iter().map(Into::into).collect();
        let item_count = u32::try_from(items.len()).map_err(|_| length_error())?;
        let new_len = (len - delete_count)
            .checked_add(item_count)
            .ok_or_else(length_error)?;

        let removed = (start..start + delete_count).map(|k| self.get(k)).collect();

        let mut deferred = Deferred::default();
        match item_count.cmp(&delete_count) {
            Ordering::Less => {
                for k in start..(len - delete_count) {
                    deferred.absorb(self.move_element(k + delete_count, k + item_count))?;
                }
                for k in (new_len..len).rev() {
                    deferred.absorb(self.delete(k))?;
                }
            }
            Ordering::Greater => {
                for k in (start..(len - delete_count)).rev() {
                    deferred.absorb(self.move_element(k + delete_count, k + item_count))?;
                }
            }
            Ordering::Equal => {}
        }
        for (k, item) in (start..).zip(items) {
            deferred.absorb(self.set(k, item))?;
        }
        deferred.absorb(self.set_length(new_len))?;
        deferred.finish(removed)
    }

    /// Reverse in place, swapping pairs from the outside in.
    pub fn reverse(&self) -> Result<(), ObserveError> {
        let len = self.array_length()?;
        let middle = len / 2;
        let mut deferred = Deferred::default();
        for lower in 0..middle {
            let upper = len - lower - 1;
            let lower_value = self.get(lower);
            let upper_value = self.get(upper);
            match (self.has_own(lower), self.has_own(upper)) {
                (true, true) => {
                    deferred.absorb(self.set(lower, upper_value))?;
                    deferred.absorb(self.set(upper, lower_value))?;
                }
                (false, true) => {
                    deferred.absorb(self.set(lower, upper_value))?;
                    deferred.absorb(self.delete(upper))?;
                }
                (true, false) => {
                    deferred.absorb(self.delete(lower))?;
                    deferred.absorb(self.set(upper, lower_value))?;
                }
                (false, false) => {}
            }
        }
        deferred.finish(())
    }

    /// Stable sort. `undefined` elements go last and holes are removed from
    /// the end.
    pub fn sort_by(
        &self,
        mut compare: impl FnMut(&Value, &Value) -> Ordering,
    ) -> Result<(), ObserveError> {
        let len = self.array_length()?;
        let present: Vec<Value> = (0..len)
            .filter(|k| self.has_own(*k))
            .map(|k| self.get(k))
            .collect();
        let (mut defined, undefined): (Vec<Value>, Vec<Value>) =
            present.into_iter().partition(|v| !v.is_undefined());
        defined.sort_by(&mut compare);

        let mut deferred = Deferred::default();
        let mut written = 0u32;
        for value in defined.into_iter().chain(undefined) {
            deferred.absorb(self.set(written, value))?;
            written += 1;
        }
        for k in written..len {
            deferred.absorb(self.delete(k))?;
        }
        deferred.finish(())
    }

    /// Shrink (or grow with holes) by assigning `length`.
    pub fn truncate(&self, len: usize) -> Result<(), ObserveError> {
        self.array_length()?;
        let len = u32::try_from(len).map_err(|_| length_error())?;
        self.set_length(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(arr: &Object) -> Vec<f64> {
        arr.to_vec()
            .unwrap()
            .iter()
            .map(|v| v.as_number().unwrap_or(f64::NAN))
            .collect()
    }

    #[test]
    fn push_pop() {
        let arr = Object::array();
        assert_eq!(arr.push(1).unwrap(), 1);
        assert_eq!(arr.extend([2, 3]).unwrap(), 3);
        assert_eq!(arr.pop().unwrap(), Value::from(3));
        assert_eq!(numbers(&arr), [1.0, 2.0]);
        let empty = Object::array();
        assert_eq!(empty.pop().unwrap(), Value::Undefined);
    }

    #[test]
    fn shift_unshift() {
        let arr = Object::from_values([1, 2, 3]);
        assert_eq!(arr.shift().unwrap(), Value::from(1));
        assert_eq!(numbers(&arr), [2.0, 3.0]);
        assert_eq!(arr.unshift([0, 1]).unwrap(), 4);
        assert_eq!(numbers(&arr), [0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn splice_shrinks_and_grows() {
        let arr = Object::from_values([1, 2, 3, 4, 5]);
        let removed = arr.splice(1, 3, [9]).unwrap();
        assert_eq!(removed, vec![Value::from(2), Value::from(3), Value::from(4)]);
        assert_eq!(numbers(&arr), [1.0, 9.0, 5.0]);

        let removed = arr.splice(1, 0, [7, 8]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(numbers(&arr), [1.0, 7.0, 8.0, 9.0, 5.0]);

        // Out of range start clamps to the end.
        arr.splice(100, 1, [6]).unwrap();
        assert_eq!(arr.len(), 6);
    }

    #[test]
    fn reverse_and_sort() {
        let arr = Object::from_values([3, 1, 2]);
        arr.reverse().unwrap();
        assert_eq!(numbers(&arr), [2.0, 1.0, 3.0]);
        arr.sort_by(|a, b| {
            a.as_number()
                .partial_cmp(&b.as_number())
                .unwrap_or(Ordering::Equal)
        })
        .unwrap();
        assert_eq!(numbers(&arr), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn sort_moves_undefined_and_holes_last() {
        let arr = Object::array();
        arr.set(0u32, 2).unwrap();
        arr.set(1u32, Value::Undefined).unwrap();
        arr.set(3u32, 1).unwrap();
        arr.sort_by(|a, b| {
            a.as_number()
                .partial_cmp(&b.as_number())
                .unwrap_or(Ordering::Equal)
        })
        .unwrap();
        assert_eq!(arr.get(0u32), Value::from(1));
        assert_eq!(arr.get(1u32), Value::from(2));
        assert!(arr.has_own(2u32));
        assert!(!arr.has_own(3u32));
        assert_eq!(arr.len(), 4);
    }

    #[test]
    fn truncate_drops_tail() {
        let arr = Object::from_values([1, 2, 3]);
        arr.truncate(1).unwrap();
        assert_eq!(numbers(&arr), [1.0]);
    }

    #[test]
    fn non_array_is_refused() {
        let obj = Object::new();
        assert!(matches!(obj.push(1), Err(ObserveError::NotAnArray)));
        assert!(matches!(obj.truncate(0), Err(ObserveError::NotAnArray)));
    }
}
