//! Storage-side error types
//!
//! Format errors (`DecodeError`) abort the current decode. Contract
//! violations (`SlotError`) point at a bug in the caller or at corrupted
//! data. `StoreError` comes from the storage collaborator. The
//! reconstruction driver wraps all of them in `ReconstructError`.

use crate::slot::SlotKind;
use avm_values::{CodeError, U256, ValueError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid type code {tag} at byte {position}")]
    InvalidTypeCode { tag: u8, position: usize },

    #[error("hash pre-image marker used as a value at byte {position}")]
    UnexpectedPreImageTag { position: usize },

    /// Inline buffer children are not implemented
    #[error("inline buffer child (marker {marker}) at byte {position} is not supported")]
    UnsupportedInlineBuffer { marker: u8, position: usize },

    #[error("unexpected end of input at byte {position}: needed {needed} more bytes")]
    UnexpectedEof { position: usize, needed: usize },

    #[error("values nested deeper than {limit} levels at byte {position}")]
    NestingTooDeep { limit: usize, position: usize },

    /// The same hash was referenced as two different kinds of node
    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("slot for {hash} is a {existing} slot, requested as {requested}")]
    KindMismatch {
        hash: U256,
        existing: SlotKind,
        requested: SlotKind,
    },

    #[error("cannot fill a {slot} slot with a {value}")]
    FillMismatch { slot: SlotKind, value: &'static str },

    #[error("no pending slots")]
    Empty,

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Code(#[from] CodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no value stored under {0}")]
    Missing(U256),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("decoding {hash}: {source}")]
    Decode { hash: U256, source: DecodeError },

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("segment {segment_id} stored under {hash}, which is not its key")]
    SegmentKeyMismatch { hash: U256, segment_id: u64 },

    #[error("reconstruction exceeded the limit of {0} nodes")]
    NodeLimit(usize),
}
