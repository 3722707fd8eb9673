//! Error types and Result aliases for vaultsync.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using vaultsync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vaultsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisted sync state error.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Embedding generation error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store error.
    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    /// Document synchronization error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// State file errors.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file exists but cannot be parsed.
    #[error("corrupt state file '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    /// The state file could not be written.
    #[error("failed to persist state to '{path}': {reason}")]
    Persist { path: String, reason: String },
}

/// Embedding-specific errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// ONNX runtime error.
    #[error("ONNX runtime error: {0}")]
    Runtime(String),

    /// Model loading error.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Worker pool error.
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// The embedder returned a different number of vectors than inputs.
    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The store rejected a request.
    #[error("{operation} on '{collection}' failed with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        collection: String,
        status: u16,
        body: String,
    },

    /// Transport-level failure after retries were exhausted.
    #[error("{operation} request failed: {reason}")]
    Transport {
        operation: &'static str,
        reason: String,
    },

    /// Collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Response body could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Per-document synchronization errors.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Source root is missing or not a directory.
    #[error("source root '{0}' does not exist or is not a directory")]
    RootMissing(String),

    /// Document could not be read.
    #[error("failed to read document '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    /// Directory walk failed.
    #[error("failed to scan '{path}': {reason}")]
    ScanFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StoreError {
    /// Create a transport error for an operation.
    pub fn transport(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            reason: reason.into(),
        }
    }
}
