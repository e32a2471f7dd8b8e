//! Slot resolution
//!
//! A hash-linked store holds a DAG: several parents may name the same child
//! hash, and a child may be named before its bytes have been fetched. The
//! deserializer never follows such a reference. It asks the session's
//! [`SlotMap`] for a placeholder instead, and every request for the same
//! hash gets a handle to the same shared record. The driving loop later
//! takes pending slots one at a time, fetches and decodes their bytes, and
//! fills the record in place, which every earlier handle then observes.
//!
//! A `SlotMap` belongs to one reconstruction session and one thread.
//! Sessions do not share placeholders.

use crate::error::SlotError;
use avm_values::{BufferRef, CodeSegment, Tuple, U256, Value, ValueError};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Tuple,
    Buffer,
    CodeSegment,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Tuple => write!(f, "tuple"),
            SlotKind::Buffer => write!(f, "buffer"),
            SlotKind::CodeSegment => write!(f, "code segment"),
        }
    }
}

/// A placeholder handle, aliasing the record it will be filled into
#[derive(Debug, Clone)]
pub enum Slot {
    Tuple(Tuple),
    Buffer(BufferRef),
    CodeSegment(CodeSegment),
}

impl Slot {
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::Tuple(_) => SlotKind::Tuple,
            Slot::Buffer(_) => SlotKind::Buffer,
            Slot::CodeSegment(_) => SlotKind::CodeSegment,
        }
    }

    pub fn is_filled(&self) -> bool {
        match self {
            Slot::Tuple(tuple) => tuple.is_initialized(),
            Slot::Buffer(buffer) => buffer.is_initialized(),
            Slot::CodeSegment(segment) => segment.is_initialized(),
        }
    }

    /// Slot aliasing a value that is already loaded
    ///
    /// Buffers are wrapped in a fresh shared record. Nums and stubs are never
    /// named by hash, so they have no slot.
    pub fn from_value(value: &Value) -> Option<Slot> {
        match value {
            Value::Tuple(tuple) => Some(Slot::Tuple(tuple.clone())),
            Value::Buffer(buffer) => Some(Slot::Buffer(BufferRef::new(buffer.clone()))),
            Value::CodeSegment(segment) => Some(Slot::CodeSegment(segment.clone())),
            Value::Num(_) | Value::CodePointStub(_) => None,
        }
    }

    /// The value this slot stands for, or `None` for an unfilled buffer
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Slot::Tuple(tuple) => Some(Value::Tuple(tuple.clone())),
            Slot::Buffer(buffer) => buffer.get().map(Value::Buffer),
            Slot::CodeSegment(segment) => Some(Value::CodeSegment(segment.clone())),
        }
    }

    /// True if both slots alias the same record
    pub fn ptr_eq(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Tuple(a), Slot::Tuple(b)) => a.ptr_eq(b),
            (Slot::Buffer(a), Slot::Buffer(b)) => a.ptr_eq(b),
            (Slot::CodeSegment(a), Slot::CodeSegment(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Overwrite the placeholder's record with the contents of `value`
    ///
    /// The slot keeps its identity; only what it points at changes.
    pub fn fill(&self, value: Value) -> Result<(), SlotError> {
        match (self, value) {
            (Slot::Tuple(tuple), Value::Tuple(decoded)) => tuple.fill_from(&decoded)?,
            (Slot::Buffer(buffer), Value::Buffer(decoded)) => buffer.fill(decoded),
            (Slot::CodeSegment(segment), Value::CodeSegment(decoded)) => {
                segment.fill_from(&decoded)?
            }
            (slot, value) => {
                return Err(SlotError::FillMismatch {
                    slot: slot.kind(),
                    value: value.kind_name(),
                });
            }
        }
        Ok(())
    }
}

/// Hash-keyed placeholders for one reconstruction session
///
/// `pending` holds slots nobody has taken yet, and `queue` the order they
/// were first requested in. Taken slots move to `taken` so that later
/// requests for the same hash still return the same handle without queueing
/// the hash for a second fetch.
#[derive(Debug, Default)]
pub struct SlotMap {
    pending: HashMap<U256, Slot>,
    queue: VecDeque<U256>,
    taken: HashMap<U256, Slot>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder tuple for `hash`, shared with every earlier request
    pub fn tuple_slot(&mut self, hash: U256) -> Result<Tuple, SlotError> {
        if let Some(existing) = self.existing(&hash) {
            return match existing {
                Slot::Tuple(tuple) => Ok(tuple.clone()),
                other => Err(mismatch(hash, other, SlotKind::Tuple)),
            };
        }
        let tuple = Tuple::uninitialized();
        self.register(hash, Slot::Tuple(tuple.clone()));
        Ok(tuple)
    }

    /// Placeholder buffer subtree for `hash`, shared with every earlier
    /// request
    pub fn buffer_slot(&mut self, hash: U256) -> Result<BufferRef, SlotError> {
        if let Some(existing) = self.existing(&hash) {
            return match existing {
                Slot::Buffer(buffer) => Ok(buffer.clone()),
                other => Err(mismatch(hash, other, SlotKind::Buffer)),
            };
        }
        let buffer = BufferRef::uninitialized();
        self.register(hash, Slot::Buffer(buffer.clone()));
        Ok(buffer)
    }

    /// Placeholder segment for `hash`, shared with every earlier request
    pub fn code_segment_slot(&mut self, hash: U256) -> Result<CodeSegment, SlotError> {
        if let Some(existing) = self.existing(&hash) {
            return match existing {
                Slot::CodeSegment(segment) => Ok(segment.clone()),
                other => Err(mismatch(hash, other, SlotKind::CodeSegment)),
            };
        }
        let segment = CodeSegment::uninitialized();
        self.register(hash, Slot::CodeSegment(segment.clone()));
        Ok(segment)
    }

    /// True when no placeholder is waiting to be taken
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of placeholders waiting to be taken
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return the oldest pending slot
    pub fn take_slot(&mut self) -> Result<(U256, Slot), SlotError> {
        // hashes adopted while pending stay queued; skip them
        while let Some(hash) = self.queue.pop_front() {
            if let Some(slot) = self.pending.remove(&hash) {
                self.taken.insert(hash, slot.clone());
                return Ok((hash, slot));
            }
        }
        Err(SlotError::Empty)
    }

    /// Record `value` as the node already loaded under `hash`
    ///
    /// If `hash` is pending (the node names itself, as a segment does
    /// through its own stubs), the pending slot is filled from `value` and
    /// its handle returned, so the caller and every earlier reference share
    /// one record. Otherwise later requests for `hash` resolve to `value`
    /// without queueing a fetch.
    pub fn adopt(&mut self, hash: U256, value: Value) -> Result<Value, SlotError> {
        if let Some(slot) = self.pending.remove(&hash) {
            slot.fill(value)?;
            let adopted = slot.to_value().ok_or(ValueError::Unresolved)?;
            trace!(%hash, kind = %slot.kind(), "adopted pending slot");
            self.taken.insert(hash, slot);
            return Ok(adopted);
        }
        if let Some(slot) = Slot::from_value(&value) {
            self.taken.entry(hash).or_insert(slot);
        }
        Ok(value)
    }

    fn existing(&self, hash: &U256) -> Option<&Slot> {
        self.pending.get(hash).or_else(|| self.taken.get(hash))
    }

    fn register(&mut self, hash: U256, slot: Slot) {
        trace!(%hash, kind = %slot.kind(), "new slot");
        self.pending.insert(hash, slot);
        self.queue.push_back(hash);
    }
}

fn mismatch(hash: U256, existing: &Slot, requested: SlotKind) -> SlotError {
    SlotError::KindMismatch {
        hash,
        existing: existing.kind(),
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_values::{Buffer, CodePoint, OpCode, Operation};

    fn h(n: u64) -> U256 {
        U256::from_u64(n)
    }

    #[test]
    fn test_tuple_slot_aliases_per_hash() {
        let mut slots = SlotMap::new();
        let a = slots.tuple_slot(h(1)).unwrap();
        let b = slots.tuple_slot(h(1)).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(slots.len(), 1);

        let (hash, slot) = slots.take_slot().unwrap();
        assert_eq!(hash, h(1));
        let decoded = Tuple::new(vec![Value::from(h(9))]).unwrap();
        slot.fill(Value::from(decoded)).unwrap();

        assert_eq!(a.get(0), Some(Value::from(h(9))));
        assert_eq!(b.get(0), Some(Value::from(h(9))));
        assert!(slots.is_empty());
    }

    #[test]
    fn test_buffer_slot_aliases_per_hash() {
        let mut slots = SlotMap::new();
        let a = slots.buffer_slot(h(2)).unwrap();
        let b = slots.buffer_slot(h(2)).unwrap();
        assert!(a.ptr_eq(&b));

        let (_, slot) = slots.take_slot().unwrap();
        slot.fill(Value::from(Buffer::leaf([4; 32]))).unwrap();
        assert_eq!(b.get(), Some(Buffer::leaf([4; 32])));
    }

    #[test]
    fn test_code_segment_slot_aliases_per_hash() {
        let mut slots = SlotMap::new();
        let a = slots.code_segment_slot(h(3)).unwrap();
        let b = slots.code_segment_slot(h(3)).unwrap();
        assert!(a.ptr_eq(&b));

        let (_, slot) = slots.take_slot().unwrap();
        let code = vec![CodePoint::new(Operation::new(OpCode(1)), U256::ZERO)];
        slot.fill(Value::from(CodeSegment::restore_code_segment(12, code)))
            .unwrap();
        assert_eq!(b.segment_id(), Some(12));
        assert_eq!(b.load().len(), 1);
    }

    #[test]
    fn test_kind_mismatch() {
        let mut slots = SlotMap::new();
        slots.tuple_slot(h(4)).unwrap();
        let err = slots.buffer_slot(h(4)).unwrap_err();
        assert_eq!(
            err,
            SlotError::KindMismatch {
                hash: h(4),
                existing: SlotKind::Tuple,
                requested: SlotKind::Buffer,
            }
        );
        assert!(slots.code_segment_slot(h(4)).is_err());
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_take_from_empty_map() {
        let mut slots = SlotMap::new();
        assert!(slots.is_empty());
        assert_eq!(slots.take_slot().unwrap_err(), SlotError::Empty);
    }

    #[test]
    fn test_taken_hash_keeps_identity() {
        let mut slots = SlotMap::new();
        let first = slots.tuple_slot(h(5)).unwrap();
        let (_, taken) = slots.take_slot().unwrap();

        let again = slots.tuple_slot(h(5)).unwrap();
        assert!(again.ptr_eq(&first));
        assert!(slots.is_empty(), "a taken hash must not be queued again");

        taken
            .fill(Value::from(Tuple::new(vec![]).unwrap()))
            .unwrap();
        assert_eq!(again.arity(), Some(0));

        // kind checks still apply after the slot was taken
        assert!(slots.buffer_slot(h(5)).is_err());
    }

    #[test]
    fn test_drain_then_empty() {
        let mut slots = SlotMap::new();
        slots.tuple_slot(h(6)).unwrap();
        slots.buffer_slot(h(7)).unwrap();
        slots.code_segment_slot(h(8)).unwrap();
        assert_eq!(slots.len(), 3);

        let mut seen = Vec::new();
        while !slots.is_empty() {
            let (hash, slot) = slots.take_slot().unwrap();
            assert!(!slot.is_filled());
            seen.push(hash);
        }
        seen.sort();
        assert_eq!(seen, vec![h(6), h(7), h(8)]);
    }

    #[test]
    fn test_take_slot_is_first_in_first_out() {
        let mut slots = SlotMap::new();
        for n in 0..20_000 {
            slots.tuple_slot(h(n)).unwrap();
        }
        // repeat requests do not move a hash in the queue
        slots.tuple_slot(h(0)).unwrap();

        for n in 0..20_000 {
            let (hash, _) = slots.take_slot().unwrap();
            assert_eq!(hash, h(n));
        }
        assert!(slots.is_empty());
        assert_eq!(slots.take_slot().unwrap_err(), SlotError::Empty);
    }

    #[test]
    fn test_adopt_fills_pending_self_reference() {
        let mut slots = SlotMap::new();
        let earlier = slots.code_segment_slot(h(9)).unwrap();
        slots.tuple_slot(h(10)).unwrap();

        let decoded = CodeSegment::restore_code_segment(
            9,
            vec![CodePoint::new(Operation::new(OpCode(2)), U256::ZERO)],
        );
        let adopted = slots.adopt(h(9), Value::from(decoded)).unwrap();
        let Value::CodeSegment(adopted) = adopted else {
            panic!("expected code segment");
        };
        assert!(adopted.ptr_eq(&earlier));
        assert_eq!(earlier.load().len(), 1);

        // the adopted hash is skipped, not fetched
        assert_eq!(slots.len(), 1);
        let (hash, _) = slots.take_slot().unwrap();
        assert_eq!(hash, h(10));
        assert!(slots.is_empty());
        assert!(slots.code_segment_slot(h(9)).unwrap().ptr_eq(&earlier));
    }

    #[test]
    fn test_adopt_unrequested_value_answers_later_requests() {
        let mut slots = SlotMap::new();
        let root = Tuple::new(vec![Value::from(h(1))]).unwrap();
        let adopted = slots.adopt(h(11), Value::from(root.clone())).unwrap();
        assert_eq!(adopted, Value::from(root.clone()));

        let later = slots.tuple_slot(h(11)).unwrap();
        assert!(later.ptr_eq(&root));
        assert!(slots.is_empty());

        // nums have no slot to record
        assert_eq!(slots.adopt(h(12), Value::from(h(3))).unwrap(), Value::from(h(3)));
        slots.tuple_slot(h(12)).unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_adopt_kind_mismatch_fails() {
        let mut slots = SlotMap::new();
        slots.tuple_slot(h(13)).unwrap();
        let err = slots.adopt(h(13), Value::from(h(1))).unwrap_err();
        assert_eq!(
            err,
            SlotError::FillMismatch {
                slot: SlotKind::Tuple,
                value: "num",
            }
        );
    }

    #[test]
    fn test_fill_mismatch() {
        let slot = Slot::Tuple(Tuple::uninitialized());
        let err = slot.fill(Value::from(h(1))).unwrap_err();
        assert_eq!(
            err,
            SlotError::FillMismatch {
                slot: SlotKind::Tuple,
                value: "num",
            }
        );
        assert!(!slot.is_filled());
    }

    #[test]
    fn test_slot_ptr_eq() {
        let tuple = Tuple::uninitialized();
        let a = Slot::Tuple(tuple.clone());
        let b = Slot::Tuple(tuple);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Slot::Buffer(BufferRef::uninitialized())));
    }
}
