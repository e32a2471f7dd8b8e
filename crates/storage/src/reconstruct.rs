//! Reconstruction driver
//!
//! Loads a root value and everything it transitively references from a
//! [`Store`]. The root is decoded first; each out-of-line reference becomes
//! a pending slot. The root itself is adopted into the session, so a node
//! reached later (or the root's own stubs) that names the root hash aliases
//! the returned value instead of fetching it again. The loop then takes one
//! pending slot at a time, fetches and decodes its bytes (which may queue
//! further slots) and fills the slot in place. The session is complete when
//! no slot is pending.

use crate::config::ReconstructConfig;
use crate::deserialize::deserialize_bytes;
use crate::error::ReconstructError;
use crate::slot::SlotMap;
use crate::store::Store;
use avm_values::{CodeSegment, U256, Value, segment_id_to_db_hash};
use tracing::{debug, trace, warn};

/// Load the value stored under `root` with all of its references resolved
pub fn reconstruct<S: Store + ?Sized>(
    store: &S,
    root: U256,
    config: &ReconstructConfig,
) -> Result<Value, ReconstructError> {
    let mut slots = SlotMap::new();
    let decoded = load_node(store, root, &mut slots)?;
    let value = slots.adopt(root, decoded)?;
    let mut nodes = 1;

    while !slots.is_empty() {
        nodes += 1;
        if !config.allows(nodes) {
            warn!(%root, limit = config.max_nodes, "reconstruction node limit reached");
            return Err(ReconstructError::NodeLimit(config.max_nodes));
        }
        let (hash, slot) = slots.take_slot()?;
        let decoded = load_node(store, hash, &mut slots)?;
        trace!(%hash, kind = %slot.kind(), pending = slots.len(), "filling slot");
        slot.fill(decoded)?;
    }

    debug!(%root, nodes, "reconstructed value");
    Ok(value)
}

fn load_node<S: Store + ?Sized>(
    store: &S,
    hash: U256,
    slots: &mut SlotMap,
) -> Result<Value, ReconstructError> {
    let bytes = store.get(&hash)?;
    let value = deserialize_bytes(&bytes, slots)
        .map_err(|source| ReconstructError::Decode { hash, source })?;
    if let Value::CodeSegment(segment) = &value {
        check_segment_key(hash, segment)?;
    }
    Ok(value)
}

/// Segments are stored under a key derived from their id
fn check_segment_key(hash: U256, segment: &CodeSegment) -> Result<(), ReconstructError> {
    match segment.segment_id() {
        Some(segment_id) if segment_id_to_db_hash(segment_id) != hash => {
            Err(ReconstructError::SegmentKeyMismatch { hash, segment_id })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, StoreError};
    use crate::store::MemoryStore;
    use avm_values::typecode::{CODE_SEGMENT, HASH_PRE_IMAGE, NUM, TUPLE};

    fn num_node(n: u64) -> Vec<u8> {
        let mut out = vec![NUM];
        out.extend_from_slice(U256::from_u64(n).as_bytes());
        out
    }

    #[test]
    fn test_single_node() {
        let mut store = MemoryStore::new();
        store.insert(U256::from_u64(1), num_node(5));
        let value = reconstruct(&store, U256::from_u64(1), &ReconstructConfig::default()).unwrap();
        assert_eq!(value, Value::from(U256::from_u64(5)));
    }

    #[test]
    fn test_missing_child() {
        let child = U256::from_u64(2);
        let mut root = vec![TUPLE + 1, HASH_PRE_IMAGE];
        root.extend_from_slice(child.as_bytes());

        let mut store = MemoryStore::new();
        store.insert(U256::from_u64(1), root);
        let err = reconstruct(&store, U256::from_u64(1), &ReconstructConfig::default()).unwrap_err();
        assert_eq!(err, ReconstructError::Store(StoreError::Missing(child)));
    }

    #[test]
    fn test_decode_error_names_hash() {
        let mut store = MemoryStore::new();
        store.insert(U256::from_u64(1), vec![HASH_PRE_IMAGE]);
        let err = reconstruct(&store, U256::from_u64(1), &ReconstructConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::Decode {
                hash: U256::from_u64(1),
                source: DecodeError::UnexpectedPreImageTag { position: 0 },
            }
        );
    }

    #[test]
    fn test_segment_under_wrong_key() {
        let mut bytes = vec![CODE_SEGMENT];
        bytes.extend(4u64.to_be_bytes());
        bytes.extend(0u64.to_be_bytes());

        let mut store = MemoryStore::new();
        store.insert(U256::from_u64(1), bytes);
        let err = reconstruct(&store, U256::from_u64(1), &ReconstructConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::SegmentKeyMismatch {
                hash: U256::from_u64(1),
                segment_id: 4
            }
        );
    }

    #[test]
    fn test_node_limit() {
        let child = U256::from_u64(2);
        let mut root = vec![TUPLE + 1, HASH_PRE_IMAGE];
        root.extend_from_slice(child.as_bytes());
        let mut store = MemoryStore::new();
        store.insert(U256::from_u64(1), root);
        store.insert(child, vec![TUPLE]);

        let err = reconstruct(&store, U256::from_u64(1), &ReconstructConfig::with_max_nodes(1))
            .unwrap_err();
        assert_eq!(err, ReconstructError::NodeLimit(1));

        assert!(reconstruct(&store, U256::from_u64(1), &ReconstructConfig::with_max_nodes(2)).is_ok());
    }
}
