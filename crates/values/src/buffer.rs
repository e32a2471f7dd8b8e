//! Buffers
//!
//! A buffer is a binary tree of 32-byte leaves. A node of depth `d` spans
//! `32 * 2^d` bytes, split evenly between its two children. Children are
//! held through [`BufferRef`], a shared handle that may still be an
//! unresolved placeholder while the tree is being loaded from storage.

use crate::error::ValueError;
use crate::hash::sha256;
use crate::typecode;
use crate::uint256::U256;
use crate::{read_lock, write_lock};
use std::sync::{Arc, RwLock};

/// Bytes per leaf
pub const LEAF_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Leaf([u8; LEAF_SIZE]),
    Node {
        depth: u8,
        left: BufferRef,
        right: BufferRef,
    },
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::Leaf([0u8; LEAF_SIZE])
    }
}

impl Buffer {
    pub fn leaf(data: [u8; LEAF_SIZE]) -> Self {
        Buffer::Leaf(data)
    }

    /// Join two subtrees; depth is one more than the deeper child
    ///
    /// Unresolved children count as depth 0.
    pub fn node(left: BufferRef, right: BufferRef) -> Self {
        let child_depth = left.depth().unwrap_or(0).max(right.depth().unwrap_or(0));
        Buffer::Node {
            depth: child_depth.saturating_add(1),
            left,
            right,
        }
    }

    /// Join two subtrees under an explicit depth (as recorded on the wire)
    pub fn with_depth(depth: u8, left: BufferRef, right: BufferRef) -> Self {
        Buffer::Node { depth, left, right }
    }

    pub fn depth(&self) -> u8 {
        match self {
            Buffer::Leaf(_) => 0,
            Buffer::Node { depth, .. } => *depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Buffer::Leaf(_))
    }

    /// Bytes spanned by this node, or `None` if that overflows `u64`
    pub fn len_bytes(&self) -> Option<u64> {
        1u64.checked_shl(u32::from(self.depth()))?
            .checked_mul(LEAF_SIZE as u64)
    }

    /// Byte at `offset`, walking down through shared children
    ///
    /// Returns `None` past the end or when the walk reaches a placeholder.
    pub fn get_byte(&self, offset: u64) -> Option<u8> {
        match self {
            Buffer::Leaf(data) => data.get(usize::try_from(offset).ok()?).copied(),
            Buffer::Node { left, right, .. } => {
                let half = self.len_bytes()? / 2;
                if offset < half {
                    left.get()?.get_byte(offset)
                } else if offset - half < half {
                    right.get()?.get_byte(offset - half)
                } else {
                    None
                }
            }
        }
    }

    pub(crate) fn content_hash(&self) -> Result<U256, ValueError> {
        match self {
            Buffer::Leaf(data) => Ok(sha256(&[&[typecode::BUFFER, 0], data])),
            Buffer::Node { depth, left, right } => {
                let left_hash = left.content_hash()?;
                let right_hash = right.content_hash()?;
                Ok(sha256(&[
                    &[typecode::BUFFER, *depth],
                    left_hash.as_bytes(),
                    right_hash.as_bytes(),
                ]))
            }
        }
    }
}

/// Shared handle to a buffer subtree stored elsewhere
///
/// Clones alias one record. A placeholder created with
/// [`BufferRef::uninitialized`] becomes visible through every clone once
/// [`BufferRef::fill`] runs.
#[derive(Debug, Clone)]
pub struct BufferRef {
    inner: Arc<RwLock<Option<Buffer>>>,
}

impl BufferRef {
    pub fn new(buffer: Buffer) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(buffer))),
        }
    }

    pub fn uninitialized() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        read_lock(&self.inner).is_some()
    }

    /// Clone of the referenced buffer, or `None` for a placeholder
    pub fn get(&self) -> Option<Buffer> {
        read_lock(&self.inner).clone()
    }

    pub fn depth(&self) -> Option<u8> {
        read_lock(&self.inner).as_ref().map(Buffer::depth)
    }

    /// Overwrite the shared record with `buffer`
    pub fn fill(&self, buffer: Buffer) {
        *write_lock(&self.inner) = Some(buffer);
    }

    pub fn ptr_eq(&self, other: &BufferRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn content_hash(&self) -> Result<U256, ValueError> {
        read_lock(&self.inner)
            .as_ref()
            .ok_or(ValueError::Unresolved)?
            .content_hash()
    }
}

impl PartialEq for BufferRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.get() == other.get()
    }
}
