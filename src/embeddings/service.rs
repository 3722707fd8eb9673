//! High-level embedding service.
//!
//! Provides a convenient async API for generating embeddings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokenizers::{Tokenizer, TruncationParams};
use tokio::sync::RwLock;

use super::model::{EmbeddingModel, DEFAULT_MODEL_NAME, EMBEDDING_DIM, MAX_SEQ_LENGTH};
use super::worker::EmbeddingWorker;
use super::Embedder;
use crate::error::EmbeddingError;
use crate::telemetry::EMBEDDING_LATENCY;
use crate::Result;

/// Embedding service configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Path to ONNX model file.
    pub model_path: PathBuf,

    /// Path to tokenizer.json file.
    pub tokenizer_path: PathBuf,

    /// Number of worker threads.
    pub num_workers: usize,
}

impl EmbeddingConfig {
    /// Create config from a model directory.
    ///
    /// Expects `{model_dir}/all-MiniLM-L6-v2.onnx` and
    /// `{model_dir}/tokenizer.json`.
    #[must_use]
    pub fn from_model_dir(model_dir: impl AsRef<Path>, num_workers: usize) -> Self {
        let dir = model_dir.as_ref();
        Self {
            model_path: dir.join(DEFAULT_MODEL_NAME),
            tokenizer_path: dir.join("tokenizer.json"),
            num_workers,
        }
    }
}

/// High-level embedding service.
///
/// Thread-safe and can be cloned cheaply.
#[derive(Clone)]
pub struct EmbeddingService {
    inner: Arc<EmbeddingServiceInner>,
}

struct EmbeddingServiceInner {
    worker: RwLock<Option<EmbeddingWorker>>,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    /// Create a new embedding service.
    ///
    /// The service is created but not initialized. Call `init()` to start workers.
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            inner: Arc::new(EmbeddingServiceInner {
                worker: RwLock::new(None),
                config,
            }),
        }
    }

    /// Load the model and tokenizer and start the worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the model or tokenizer cannot be loaded.
    pub async fn init(&self) -> Result<()> {
        let mut worker_guard = self.inner.worker.write().await;
        if worker_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Initializing embedding service");

        let model = EmbeddingModel::load(&self.inner.config.model_path)?;

        let mut tokenizer = Tokenizer::from_file(&self.inner.config.tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenization(format!("failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::Tokenization(format!("failed to set truncation: {e}")))?;

        let worker = EmbeddingWorker::new(
            model.into_session(),
            Arc::new(tokenizer),
            self.inner.config.num_workers,
        )?;
        *worker_guard = Some(worker);
        drop(worker_guard);

        tracing::info!("Embedding service initialized");
        Ok(())
    }

    /// Check if the service is initialized.
    pub async fn is_initialized(&self) -> bool {
        self.inner.worker.read().await.is_some()
    }

    /// Generate embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if not initialized or embedding fails.
    #[allow(clippy::significant_drop_tightening)]
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let worker_guard = self.inner.worker.read().await;
        let worker = worker_guard
            .as_ref()
            .ok_or_else(|| EmbeddingError::WorkerPool("service not initialized".to_string()))?;
        worker.embed(texts).await
    }
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let started = Instant::now();
        let vectors = self.embed_batch(texts).await?;
        EMBEDDING_LATENCY.observe(started.elapsed().as_secs_f64());
        Ok(vectors)
    }
}

/// Create a placeholder embedding.
///
/// Returns a deterministic, normalized vector derived from the text hash.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn placeholder_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let digest = blake3::hash(text.as_bytes());
    let mut seed = u64::from_le_bytes(
        digest.as_bytes()[..8]
            .try_into()
            .unwrap_or([0u8; 8]),
    );

    let mut embedding = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let value = (((seed >> 33) as f32) / (u32::MAX as f32)).mul_add(2.0, -1.0);
        embedding.push(value);
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

/// Embedder producing [`placeholder_embedding`] vectors.
///
/// Useful for exercising the pipeline without a model on disk.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderEmbedder {
    dimension: usize,
}

impl PlaceholderEmbedder {
    /// Create a placeholder embedder of the given dimension.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for PlaceholderEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for PlaceholderEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| placeholder_embedding(t, self.dimension))
            .collect())
    }
}
