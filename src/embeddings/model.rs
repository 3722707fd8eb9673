//! ONNX embedding model loading.

use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::error::EmbeddingError;
use crate::Result;

/// Default model file name inside the model directory.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2.onnx";

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length fed to the model.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Loaded ONNX session for the embedding model.
pub struct EmbeddingModel {
    session: Session,
}

impl EmbeddingModel {
    /// Load an ONNX embedding model from the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file is missing or cannot be loaded.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            return Err(EmbeddingError::ModelLoad(format!(
                "model file not found: {}",
                model_path.display()
            ))
            .into());
        }

        tracing::info!(path = %model_path.display(), "Loading ONNX embedding model");

        let session = Session::builder()
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("failed to load model: {e}")))?;

        tracing::info!(
            path = %model_path.display(),
            inputs = session.inputs().len(),
            "Model loaded"
        );

        Ok(Self { session })
    }

    /// Take ownership of the session for the worker pool.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }
}

impl std::fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("embedding_dim", &EMBEDDING_DIM)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_model() {
        let err = EmbeddingModel::load("/nonexistent/model.onnx").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
