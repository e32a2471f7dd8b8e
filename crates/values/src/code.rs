//! Code segments
//!
//! A segment is an append-only list of code points shared by every holder of
//! its handle. The interpreter reads it through [`CodeSegment::load`] while
//! closures and continuations may still be appending to it from other
//! threads.
//!
//! # Concurrency
//!
//! ```text
//! CodeSegment ──Arc──► CodeSegmentInner
//!                       ├─ segment_id: OnceLock<u64>
//!                       ├─ append: Mutex<()>            one writer at a time
//!                       └─ code:   RwLock<Vec<CodePoint>>
//!                                   ▲ shared: load() views
//!                                   └ exclusive: push into spare capacity,
//!                                                or swap in a grown copy
//! ```
//!
//! Writers serialize on `append`, so the length a writer checked cannot move
//! under it. The grown copy is built while readers keep their shared locks;
//! the exclusive lock is held only for the push or the swap. A reader sees
//! the whole old vector or the whole new one.
//!
//! Published code points are never modified: growth only adds indices past
//! the current length.
//!
//! # Hash chain
//!
//! Each appended code point records the hash of the entry before it
//! (`U256::ZERO` for the first), and a code point's own hash covers its
//! operation and that `next_hash`. A stub for index `i` carries the hash of
//! entry `i`, which commits to everything reachable from it without holding
//! the segment.

use crate::error::{CodeError, ValueError};
use crate::hash::{segment_id_to_db_hash, sha256};
use crate::typecode;
use crate::uint256::U256;
use crate::value::Value;
use crate::{lock, read_lock, write_lock};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, RwLockReadGuard};
use tracing::debug;

/// Capacity of the first backing vector of a fresh segment
const INITIAL_CAPACITY: usize = 16;

/// Process-wide segment id counter
static SEGMENT_IDS: SegmentIdAllocator = SegmentIdAllocator::new();

/// Lock-free source of segment ids
///
/// Ids are handed out in allocation order and never reused. The process
/// uses one static instance; tests can build their own.
#[derive(Debug)]
pub struct SegmentIdAllocator {
    next: AtomicU64,
}

impl SegmentIdAllocator {
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next allocation will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for SegmentIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Instruction opcode. Instruction semantics belong to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpCode(pub u8);

/// An opcode plus an optional immediate value
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub opcode: OpCode,
    pub immediate: Option<Value>,
}

impl Operation {
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            immediate: None,
        }
    }

    pub fn with_immediate(opcode: OpCode, immediate: Value) -> Self {
        Self {
            opcode,
            immediate: Some(immediate),
        }
    }
}

/// One instruction and the hash of the code point preceding it
#[derive(Debug, Clone, PartialEq)]
pub struct CodePoint {
    pub op: Operation,
    pub next_hash: U256,
}

impl CodePoint {
    pub fn new(op: Operation, next_hash: U256) -> Self {
        Self { op, next_hash }
    }

    /// Hash committing to this operation and everything after it
    pub fn hash(&self) -> Result<U256, ValueError> {
        let opcode = self.op.opcode.0;
        match &self.op.immediate {
            None => Ok(sha256(&[
                &[typecode::CODE_POINT_STUB, 0, opcode],
                self.next_hash.as_bytes(),
            ])),
            Some(immediate) => {
                let immediate_hash = immediate.hash()?;
                Ok(sha256(&[
                    &[typecode::CODE_POINT_STUB, 1, opcode],
                    immediate_hash.as_bytes(),
                    self.next_hash.as_bytes(),
                ]))
            }
        }
    }
}

/// Lightweight handle to one code point of a segment
#[derive(Debug, Clone, PartialEq)]
pub struct CodePointStub {
    pub segment: CodeSegment,
    pub pc: u64,
    /// Hash of the referenced code point
    pub next_hash: U256,
}

impl CodePointStub {
    pub fn new(segment: CodeSegment, pc: u64, next_hash: U256) -> Self {
        Self {
            segment,
            pc,
            next_hash,
        }
    }

    /// Copy of the referenced code point, if the segment holds it yet
    pub fn code_point(&self) -> Option<CodePoint> {
        let index = usize::try_from(self.pc).ok()?;
        self.segment.load().get(index).cloned()
    }
}

#[derive(Debug)]
struct CodeSegmentInner {
    segment_id: OnceLock<u64>,
    code: RwLock<Vec<CodePoint>>,
    append: Mutex<()>,
}

/// Shared handle to a code segment
///
/// Equality is identity: two handles are equal when they alias the same
/// segment, not when their code matches.
#[derive(Debug, Clone)]
pub struct CodeSegment {
    inner: Arc<CodeSegmentInner>,
}

impl PartialEq for CodeSegment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl CodeSegment {
    /// Create an empty segment with a fresh process-unique id
    pub fn new_segment() -> Self {
        Self::new_segment_in(&SEGMENT_IDS)
    }

    /// Create an empty segment with an id drawn from `ids`
    pub fn new_segment_in(ids: &SegmentIdAllocator) -> Self {
        let segment_id = ids.allocate();
        debug!(segment_id, "new code segment");
        Self::from_parts(Some(segment_id), Vec::with_capacity(INITIAL_CAPACITY))
    }

    /// Rebuild a segment read back from storage
    ///
    /// The id comes from the stored bytes. The process counter is neither
    /// consulted nor advanced, so callers restoring segments alongside fresh
    /// ones must keep the two id spaces disjoint.
    pub fn restore_code_segment(segment_id: u64, code: Vec<CodePoint>) -> Self {
        Self::from_parts(Some(segment_id), code)
    }

    /// Placeholder with no id and no code, filled later via
    /// [`CodeSegment::fill_from`]
    pub fn uninitialized() -> Self {
        Self::from_parts(None, Vec::new())
    }

    fn from_parts(segment_id: Option<u64>, code: Vec<CodePoint>) -> Self {
        Self {
            inner: Arc::new(CodeSegmentInner {
                segment_id: segment_id.map(OnceLock::from).unwrap_or_default(),
                code: RwLock::new(code),
                append: Mutex::new(()),
            }),
        }
    }

    /// Id of the segment, or `None` for an unfilled placeholder
    pub fn segment_id(&self) -> Option<u64> {
        self.inner.segment_id.get().copied()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.segment_id.get().is_some()
    }

    /// Storage key of this segment (a function of the id only)
    pub fn hash(&self) -> Option<U256> {
        self.segment_id().map(segment_id_to_db_hash)
    }

    pub fn ptr_eq(&self, other: &CodeSegment) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append `op` at index `pc`, which must equal the current length
    ///
    /// Returns a stub for the new code point. On error the segment is left
    /// unchanged.
    pub fn add_operation_at(&self, op: Operation, pc: u64) -> Result<CodePointStub, CodeError> {
        let segment_id = self.segment_id().ok_or(ValueError::Unresolved)?;
        let _writer = lock(&self.inner.append);

        let code = read_lock(&self.inner.code);
        let length = code.len() as u64;
        if pc != length {
            return Err(CodeError::OutOfOrderAppend {
                segment_id,
                expected: length,
                got: pc,
            });
        }

        let next_hash = match code.last() {
            Some(previous) => previous.hash()?,
            None => U256::ZERO,
        };
        let point = CodePoint::new(op, next_hash);
        let point_hash = point.hash()?;

        if code.len() < code.capacity() {
            drop(code);
            write_lock(&self.inner.code).push(point);
        } else {
            let capacity = (code.capacity() * 2).max(INITIAL_CAPACITY);
            let mut grown = Vec::with_capacity(capacity);
            grown.extend(code.iter().cloned());
            grown.push(point);
            drop(code);
            *write_lock(&self.inner.code) = grown;
            debug!(segment_id, capacity, "grew code segment");
        }

        Ok(CodePointStub::new(self.clone(), pc, point_hash))
    }

    /// Shared read access to the code points
    ///
    /// Appends to this segment wait until the view is dropped, so a thread
    /// must not append while it holds a view of the same segment.
    pub fn load(&self) -> LoadedCodeSegment<'_> {
        LoadedCodeSegment {
            segment: self,
            guard: read_lock(&self.inner.code),
        }
    }

    /// Give this placeholder the id and code of `source`
    ///
    /// Every handle aliasing `self` observes the result. Fails if `self`
    /// already has an id or `source` has none.
    pub fn fill_from(&self, source: &CodeSegment) -> Result<(), CodeError> {
        if let Some(existing) = self.segment_id() {
            return Err(CodeError::AlreadyInitialized(existing));
        }
        let segment_id = source.segment_id().ok_or(ValueError::Unresolved)?;
        let code = source.load().to_vec();

        let _writer = lock(&self.inner.append);
        if let Some(existing) = self.segment_id() {
            return Err(CodeError::AlreadyInitialized(existing));
        }
        // code first: a reader that sees the id must also see the code
        *write_lock(&self.inner.code) = code;
        self.inner
            .segment_id
            .set(segment_id)
            .map_err(|_| CodeError::AlreadyInitialized(self.segment_id().unwrap_or(segment_id)))
    }
}

/// Scoped read view of a segment's code points
///
/// Holds the segment's shared lock until dropped. Derefs to a slice, so it
/// can be indexed, iterated and measured.
#[derive(Debug)]
pub struct LoadedCodeSegment<'a> {
    segment: &'a CodeSegment,
    guard: RwLockReadGuard<'a, Vec<CodePoint>>,
}

impl LoadedCodeSegment<'_> {
    pub fn segment(&self) -> &CodeSegment {
        self.segment
    }
}

impl Deref for LoadedCodeSegment<'_> {
    type Target = [CodePoint];

    fn deref(&self) -> &[CodePoint] {
        &self.guard
    }
}

impl<'v> IntoIterator for &'v LoadedCodeSegment<'_> {
    type Item = &'v CodePoint;
    type IntoIter = std::slice::Iter<'v, CodePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.guard.iter()
    }
}
