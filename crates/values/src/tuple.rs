//! Tuples
//!
//! A `Tuple` is a handle to one shared, heap-allocated element record.
//! Cloning the handle aliases the record. The record starts out either with
//! its elements or empty (an unresolved placeholder), and a placeholder is
//! filled in place so every clone observes the same elements.

use crate::error::ValueError;
use crate::typecode::MAX_TUPLE_SIZE;
use crate::uint256::U256;
use crate::value::Value;
use crate::{read_lock, write_lock};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct Tuple {
    inner: Arc<RwLock<Option<Vec<Value>>>>,
}

impl Tuple {
    /// Create a tuple holding `elements`
    pub fn new(elements: Vec<Value>) -> Result<Self, ValueError> {
        if elements.len() > MAX_TUPLE_SIZE {
            return Err(ValueError::TupleTooLarge(elements.len()));
        }
        Ok(Self::from_elements(elements))
    }

    /// Create a tuple of `arity` elements, each `Num(0)`, ready for
    /// positional writes with [`Tuple::set_element`]
    pub fn sized(arity: usize) -> Result<Self, ValueError> {
        if arity > MAX_TUPLE_SIZE {
            return Err(ValueError::TupleTooLarge(arity));
        }
        Ok(Self::from_elements(vec![Value::default(); arity]))
    }

    /// Create an unresolved placeholder
    pub fn uninitialized() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    fn from_elements(elements: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(elements))),
        }
    }

    pub fn is_initialized(&self) -> bool {
        read_lock(&self.inner).is_some()
    }

    /// Number of elements, or `None` for a placeholder
    pub fn arity(&self) -> Option<usize> {
        read_lock(&self.inner).as_ref().map(Vec::len)
    }

    /// Clone of the element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        read_lock(&self.inner).as_ref()?.get(index).cloned()
    }

    /// Snapshot of all elements, or `None` for a placeholder
    pub fn elements(&self) -> Option<Vec<Value>> {
        read_lock(&self.inner).clone()
    }

    /// Overwrite the element at `index`
    pub fn set_element(&self, index: usize, value: Value) -> Result<(), ValueError> {
        let mut guard = write_lock(&self.inner);
        let elements = guard.as_mut().ok_or(ValueError::Unresolved)?;
        let arity = elements.len();
        let slot = elements
            .get_mut(index)
            .ok_or(ValueError::IndexOutOfRange { index, arity })?;
        *slot = value;
        Ok(())
    }

    /// Copy `source`'s elements into this tuple's shared record
    ///
    /// Every handle aliasing `self` sees the new elements. `source` must be
    /// initialized.
    pub fn fill_from(&self, source: &Tuple) -> Result<(), ValueError> {
        if self.ptr_eq(source) {
            return if self.is_initialized() {
                Ok(())
            } else {
                Err(ValueError::Unresolved)
            };
        }
        let elements = source.elements().ok_or(ValueError::Unresolved)?;
        *write_lock(&self.inner) = Some(elements);
        Ok(())
    }

    /// True if both handles alias the same record
    pub fn ptr_eq(&self, other: &Tuple) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn content_hash(&self) -> Result<U256, ValueError> {
        let guard = read_lock(&self.inner);
        let elements = guard.as_ref().ok_or(ValueError::Unresolved)?;
        let code = crate::typecode::tuple_code(elements.len())
            .ok_or(ValueError::TupleTooLarge(elements.len()))?;
        let mut preimage = Vec::with_capacity(1 + U256::BYTES * elements.len());
        preimage.push(code);
        for element in elements {
            preimage.extend_from_slice(element.hash()?.as_bytes());
        }
        Ok(crate::hash::sha256(&[&preimage]))
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.elements() == other.elements()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_oversized() {
        let elements = vec![Value::default(); MAX_TUPLE_SIZE + 1];
        assert_eq!(
            Tuple::new(elements),
            Err(ValueError::TupleTooLarge(MAX_TUPLE_SIZE + 1))
        );
        assert!(Tuple::sized(9).is_err());
    }

    #[test]
    fn test_sized_tuple_positional_write() {
        let tuple = Tuple::sized(3).unwrap();
        tuple.set_element(2, Value::from(U256::from_u64(9))).unwrap();
        assert_eq!(tuple.get(0), Some(Value::default()));
        assert_eq!(tuple.get(2), Some(Value::from(U256::from_u64(9))));
        assert_eq!(
            tuple.set_element(3, Value::default()),
            Err(ValueError::IndexOutOfRange { index: 3, arity: 3 })
        );
    }

    #[test]
    fn test_clones_alias() {
        let a = Tuple::sized(1).unwrap();
        let b = a.clone();
        a.set_element(0, Value::from(U256::from_u64(5))).unwrap();
        assert_eq!(b.get(0), Some(Value::from(U256::from_u64(5))));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_fill_placeholder_in_place() {
        let placeholder = Tuple::uninitialized();
        let alias = placeholder.clone();
        assert!(!alias.is_initialized());
        assert_eq!(alias.arity(), None);

        let decoded = Tuple::new(vec![Value::from(U256::from_u64(1))]).unwrap();
        placeholder.fill_from(&decoded).unwrap();

        assert_eq!(alias.arity(), Some(1));
        assert!(!alias.ptr_eq(&decoded));
        assert_eq!(alias, decoded);
    }

    #[test]
    fn test_fill_from_placeholder_fails() {
        let target = Tuple::uninitialized();
        assert_eq!(
            target.fill_from(&Tuple::uninitialized()),
            Err(ValueError::Unresolved)
        );
        assert_eq!(target.fill_from(&target.clone()), Err(ValueError::Unresolved));
    }

    #[test]
    fn test_set_element_on_placeholder() {
        let tuple = Tuple::uninitialized();
        assert_eq!(
            tuple.set_element(0, Value::default()),
            Err(ValueError::Unresolved)
        );
    }
}
