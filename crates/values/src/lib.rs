//! AVM Values: the in-memory value model of a content-addressed VM
//!
//! Values are built from shared handles so that a graph loaded lazily from a
//! hash-linked store can hand out references before their contents arrive and
//! fill them in place afterwards.
//!
//! # Modules
//!
//! - `uint256`: 256-bit word boundary type
//! - `typecode`: one-byte type codes shared by the wire format and the hasher
//! - `hash`: SHA-256 content hashing helpers
//! - `value`: the closed `Value` enum
//! - `tuple`: shared, fillable tuples of 0 to 8 values
//! - `buffer`: binary trees of 32-byte leaves
//! - `code`: append-only, concurrently readable code segments
//! - `error`: error types

pub mod buffer;
pub mod code;
pub mod error;
pub mod hash;
pub mod tuple;
pub mod typecode;
pub mod uint256;
pub mod value;

pub use buffer::{Buffer, BufferRef, LEAF_SIZE};
pub use code::{
    CodePoint, CodePointStub, CodeSegment, LoadedCodeSegment, OpCode, Operation,
    SegmentIdAllocator,
};
pub use error::{CodeError, ValueError};
pub use hash::segment_id_to_db_hash;
pub use tuple::Tuple;
pub use typecode::MAX_TUPLE_SIZE;
pub use uint256::U256;
pub use value::Value;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Lock poisoning is ignored: writers never leave a record half-updated, they
// either replace it whole or push one element.

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
