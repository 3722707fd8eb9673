//! Sentence embeddings.
//!
//! This module provides:
//! - The [`Embedder`] capability used by the synchronizer
//! - ONNX Runtime inference of all-MiniLM-L6-v2 via the `ort` crate
//! - A dedicated thread pool so inference never blocks the async runtime

mod model;
mod service;
mod worker;

use async_trait::async_trait;

use crate::Result;

pub use model::{EmbeddingModel, DEFAULT_MODEL_NAME, EMBEDDING_DIM, MAX_SEQ_LENGTH};
pub use service::{placeholder_embedding, EmbeddingConfig, EmbeddingService, PlaceholderEmbedder};

/// Turns texts into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimensionality.
    fn dimension(&self) -> usize;

    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
