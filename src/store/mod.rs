//! Remote vector index.
//!
//! This module provides:
//! - The [`VectorStore`] capability used by the synchronizer
//! - A Qdrant REST implementation
//! - An in-memory implementation for tests and local experiments

mod memory;
mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

pub use memory::{MemoryStore, StoreOp};
pub use qdrant::QdrantStore;

/// Vector similarity metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

/// Vector schema a collection is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Named-vector key.
    pub vector_name: String,
    /// Vector dimensionality.
    pub size: usize,
    /// Similarity metric.
    pub distance: Distance,
}

impl CollectionSpec {
    /// Cosine collection with a single named vector.
    pub fn cosine(vector_name: impl Into<String>, size: usize) -> Self {
        Self {
            vector_name: vector_name.into(),
            size,
            distance: Distance::Cosine,
        }
    }
}

/// Chunk metadata stored alongside each point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointMetadata {
    pub file_path: String,
    pub title: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub collection: String,
    pub folder: String,
    pub last_modified: String,
}

/// Point payload in the layout the MCP Qdrant server reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    /// Chunk text.
    pub document: String,
    pub metadata: PointMetadata,
}

/// One record of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: Uuid,
    pub vector_name: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Operations the synchronizer needs from a vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `name` with `spec` unless it already exists.
    ///
    /// Returns `true` if the collection was created.
    async fn ensure_collection(&self, name: &str, spec: &CollectionSpec) -> Result<bool>;

    /// Insert or replace points by id.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Delete points by id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()>;

    /// Number of points stored in a collection.
    async fn point_count(&self, collection: &str) -> Result<u64>;
}
