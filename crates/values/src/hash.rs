//! Content hashing
//!
//! All hashes are SHA-256 over a type code followed by the fields of the
//! value. Child values contribute their own hash, never their bytes, so a
//! node's hash can be computed from its children's hashes alone.

use crate::typecode;
use crate::uint256::U256;
use sha2::{Digest, Sha256};

/// SHA-256 over the concatenation of `parts`
pub fn sha256(parts: &[&[u8]]) -> U256 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    U256::from_be_bytes(hasher.finalize().into())
}

/// Storage key of a code segment
///
/// Derived from the id alone: the bytes stored under this key are the
/// authoritative contents, and two segments with identical code but different
/// ids do not share a key.
pub fn segment_id_to_db_hash(segment_id: u64) -> U256 {
    sha256(&[&[typecode::CODE_SEGMENT], &segment_id.to_be_bytes()])
}
