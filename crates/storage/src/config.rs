//! Reconstruction configuration
//!
//! ## Configuration (Environment Variables)
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AVM_RECONSTRUCT_MAX_NODES` | `0` (unlimited) | Most nodes one session may fetch and decode |
//!
//! ## Example
//!
//! ```bash
//! # Refuse to load graphs larger than one million nodes
//! AVM_RECONSTRUCT_MAX_NODES=1000000 ./my-node
//! ```

/// Environment variable holding the node limit
pub const MAX_NODES_VAR: &str = "AVM_RECONSTRUCT_MAX_NODES";

/// Limits applied to one reconstruction session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructConfig {
    /// Most nodes (root included) a session may decode; 0 means unlimited
    pub max_nodes: usize,
}

impl ReconstructConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let max_nodes = std::env::var(MAX_NODES_VAR)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        Self { max_nodes }
    }

    pub fn with_max_nodes(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// True if decoding `count` nodes stays within the limit
    pub fn allows(&self, count: usize) -> bool {
        self.max_nodes == 0 || count <= self.max_nodes
    }
}
