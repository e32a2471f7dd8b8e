//! Storage collaborator
//!
//! The key/value engine lives outside this crate. Reconstruction only needs
//! to fetch the exact bytes stored under a hash; retries and caching are the
//! engine's business.
//!
//! Two adapters ship here: [`MemoryStore`] for tests and embedding, and
//! [`DirStore`], one file per node named by the hash in lowercase hex, for
//! inspecting dumps on disk.

use crate::error::StoreError;
use avm_values::U256;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Content-addressed byte store
pub trait Store {
    /// Bytes previously stored under `hash`
    fn get(&self, hash: &U256) -> Result<Vec<u8>, StoreError>;
}

impl<S: Store + ?Sized> Store for &S {
    fn get(&self, hash: &U256) -> Result<Vec<u8>, StoreError> {
        (**self).get(hash)
    }
}

/// In-process store backed by a `HashMap`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: HashMap<U256, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `hash`, replacing any earlier entry
    pub fn insert(&mut self, hash: U256, bytes: Vec<u8>) {
        self.nodes.insert(hash, bytes);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, hash: &U256) -> Result<Vec<u8>, StoreError> {
        self.nodes
            .get(hash)
            .cloned()
            .ok_or(StoreError::Missing(*hash))
    }
}

/// Directory of node files, one per hash
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open `root`, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| backend(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `hash`, replacing any earlier file
    pub fn put(&self, hash: &U256, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(hash);
        fs::write(&path, bytes).map_err(|e| backend(&path, e))
    }

    fn path_for(&self, hash: &U256) -> PathBuf {
        self.root.join(hex::encode(hash.as_bytes()))
    }
}

impl Store for DirStore {
    fn get(&self, hash: &U256) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(hash);
        trace!(path = %path.display(), "reading node");
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::Missing(*hash)),
            Err(e) => Err(backend(&path, e)),
        }
    }
}

fn backend(path: &Path, err: io::Error) -> StoreError {
    StoreError::Backend(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_get() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        store.insert(U256::from_u64(1), vec![1, 2, 3]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&U256::from_u64(1)), Ok(vec![1, 2, 3]));
        assert_eq!(
            store.get(&U256::from_u64(2)),
            Err(StoreError::Missing(U256::from_u64(2)))
        );
    }

    #[test]
    fn test_dir_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::open(dir.path().join("nodes")).unwrap();
        let hash = U256::from_u64(0xabcd);
        store.put(&hash, &[9, 8, 7]).unwrap();

        assert_eq!(store.get(&hash), Ok(vec![9, 8, 7]));
        let file = store.root().join(hex::encode(hash.as_bytes()));
        assert!(file.is_file());
    }

    #[test]
    fn test_dir_store_missing_node() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(&U256::ZERO),
            Err(StoreError::Missing(U256::ZERO))
        );
    }

    #[test]
    fn test_dir_store_unreadable_node_is_backend_error() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        // a directory where a node file should be
        fs::create_dir(dir.path().join(hex::encode(U256::ZERO.as_bytes()))).unwrap();
        assert!(matches!(store.get(&U256::ZERO), Err(StoreError::Backend(_))));
    }
}
