//! Data models for persisted sync state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state of every synced document, keyed by relative path.
pub type SyncState = BTreeMap<String, StateEntry>;

/// What the remote index holds for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Content hash at the last successful sync.
    pub hash: String,

    /// Number of points written at the last successful sync.
    #[serde(alias = "chunkCount")]
    pub chunks: usize,

    /// Collection those points were written to.
    pub collection: String,
}

impl StateEntry {
    /// Create a new state entry.
    #[must_use]
    pub fn new(hash: impl Into<String>, chunks: usize, collection: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            chunks,
            collection: collection.into(),
        }
    }
}
