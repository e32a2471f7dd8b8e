//! AVM Storage: loading hash-linked values back into memory
//!
//! Values are persisted one node per key in a content-addressed store. A
//! node inlines small children and names the rest by hash. Loading a graph
//! decodes the root, hands out shared placeholders for every hash it names,
//! and fills those placeholders in place as their nodes are fetched.
//!
//! # Modules
//!
//! - `deserialize`: wire-format decoder and byte cursor
//! - `slot`: per-session placeholder map (`SlotMap`)
//! - `store`: storage collaborator trait, in-memory and directory stores
//! - `reconstruct`: the fetch/decode/fill loop
//! - `config`: env-var driven session limits
//! - `error`: error types

pub mod config;
pub mod deserialize;
pub mod error;
pub mod reconstruct;
pub mod slot;
pub mod store;

pub use config::ReconstructConfig;
pub use deserialize::{Cursor, MAX_NESTING, deserialize_bytes, deserialize_value};
pub use error::{DecodeError, ReconstructError, SlotError, StoreError};
pub use reconstruct::reconstruct;
pub use slot::{Slot, SlotKind, SlotMap};
pub use store::{DirStore, MemoryStore, Store};
