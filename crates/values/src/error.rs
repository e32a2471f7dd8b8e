//! Errors raised by the value model and code segments
//!
//! Everything here is a contract violation by the caller or an attempt to use
//! a placeholder before it was filled. None of it is retryable.

use crate::typecode::MAX_TUPLE_SIZE;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("tuple arity {0} exceeds the maximum of {MAX_TUPLE_SIZE}")]
    TupleTooLarge(usize),

    #[error("tuple index {index} out of range for arity {arity}")]
    IndexOutOfRange { index: usize, arity: usize },

    /// A placeholder was read before its slot was filled
    #[error("value is an unresolved placeholder")]
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// Appends must land exactly at the current end of the segment
    #[error("out-of-order append to segment {segment_id}: length is {expected}, got pc {got}")]
    OutOfOrderAppend {
        segment_id: u64,
        expected: u64,
        got: u64,
    },

    #[error("segment {0} is already initialized")]
    AlreadyInitialized(u64),

    #[error(transparent)]
    Value(#[from] ValueError),
}
