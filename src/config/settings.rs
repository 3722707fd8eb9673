//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// Folders whose contents are never indexed, matched anywhere in a path.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".obsidian",
    ".trash",
    ".history",
    "attachments",
    "copilot-conversations",
    "copilot-custom-prompts",
    "Templates",
];

/// Named-vector key expected by the downstream MCP Qdrant server.
pub const DEFAULT_VECTOR_NAME: &str = "fast-all-minilm-l6-v2";

/// Main configuration for a sync pass.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the document tree.
    pub root: PathBuf,

    /// Path of the persisted sync state.
    pub state_file: PathBuf,

    /// Base URL of the Qdrant REST API.
    pub qdrant_url: String,

    /// Optional Qdrant API key.
    pub qdrant_api_key: Option<String>,

    /// Per-request timeout for the vector store, in seconds.
    pub request_timeout_secs: u64,

    /// Attempts per vector store request before giving up.
    pub max_retries: usize,

    /// Directory holding the ONNX model and `tokenizer.json`.
    pub model_dir: PathBuf,

    /// Number of embedding worker threads.
    pub embedding_threads: usize,

    /// Texts sent to the embedder per batch.
    pub embed_batch_size: usize,

    /// Named-vector key used for every point.
    pub vector_name: String,

    /// Maximum chunk length in characters.
    pub max_chunk_chars: usize,

    /// Chunks at or below this many characters are discarded.
    pub min_chunk_chars: usize,

    /// File extensions treated as documents.
    pub extensions: Vec<String>,

    /// Directory names excluded anywhere in the tree.
    pub skip_dirs: Vec<String>,

    /// Top-level folders routed to the restricted collection.
    pub restricted_prefixes: Vec<String>,

    /// Collection for documents under a restricted prefix.
    pub restricted_collection: String,

    /// Collection for everything else.
    pub default_collection: String,

    /// Honour `.gitignore` and `.ignore` files while scanning.
    pub respect_ignore_files: bool,

    /// Ignore prior state and reprocess every document.
    pub force: bool,

    /// Compute everything but perform no remote writes and no state save.
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Write Prometheus text exposition here after the pass.
    pub metrics_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            state_file: PathBuf::from(".index_state.json"),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            request_timeout_secs: 30,
            max_retries: 3,
            model_dir: PathBuf::from("./models"),
            embedding_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(4),
            embed_batch_size: 64,
            vector_name: DEFAULT_VECTOR_NAME.to_string(),
            max_chunk_chars: 800,
            min_chunk_chars: 30,
            extensions: vec!["md".to_string()],
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| (*s).to_string()).collect(),
            restricted_prefixes: Vec::new(),
            restricted_collection: "work".to_string(),
            default_collection: "personal".to_string(),
            respect_ignore_files: false,
            force: false,
            dry_run: false,
            log_level: "info".to_string(),
            log_json: false,
            metrics_file: None,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration rooted at `root` with defaults elsewhere.
    #[must_use]
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.max_chunk_chars == 0 {
            return Err(Error::config("max_chunk_chars cannot be 0"));
        }

        if self.min_chunk_chars >= self.max_chunk_chars {
            return Err(Error::config(format!(
                "min_chunk_chars ({}) must be smaller than max_chunk_chars ({})",
                self.min_chunk_chars, self.max_chunk_chars
            )));
        }

        if self.embedding_threads == 0 {
            return Err(Error::config("embedding_threads cannot be 0"));
        }

        if self.embedding_threads > 32 {
            return Err(Error::config(
                "embedding_threads cannot exceed 32 (hardware limit)",
            ));
        }

        if self.embed_batch_size == 0 {
            return Err(Error::config("embed_batch_size cannot be 0"));
        }

        if self.max_retries == 0 {
            return Err(Error::config("max_retries cannot be 0"));
        }

        if !(self.qdrant_url.starts_with("http://") || self.qdrant_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "qdrant_url must be an http(s) URL, got '{}'",
                self.qdrant_url
            )));
        }

        if self.extensions.is_empty() {
            return Err(Error::config("at least one document extension is required"));
        }

        if self.vector_name.trim().is_empty() {
            return Err(Error::config("vector_name cannot be empty"));
        }

        if self.restricted_collection.trim().is_empty() || self.default_collection.trim().is_empty()
        {
            return Err(Error::config("collection names cannot be empty"));
        }

        if self.restricted_collection == self.default_collection {
            return Err(Error::config(format!(
                "restricted and default collection are both '{}'",
                self.default_collection
            )));
        }

        Ok(())
    }
}
