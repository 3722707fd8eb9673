//! vaultsync - incremental vault to Qdrant synchronization
//!
//! Entry point for a single sync pass.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use vaultsync::config::DEFAULT_SKIP_DIRS;
use vaultsync::embeddings::{EmbeddingConfig, EmbeddingService};
use vaultsync::store::QdrantStore;
use vaultsync::sync::{Runner, SyncReport};
use vaultsync::telemetry::{init_metrics, init_tracing, write_metrics};
use vaultsync::{Config, Result};

/// Sync a Markdown vault into a Qdrant vector index
#[derive(Parser, Debug)]
#[command(name = "vaultsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory of the vault
    #[arg(short, long, env = "VAULTSYNC_ROOT")]
    root: PathBuf,

    /// Path of the sync state file
    #[arg(long, env = "VAULTSYNC_STATE_FILE", default_value = ".index_state.json")]
    state_file: PathBuf,

    /// Qdrant REST endpoint
    #[arg(long, env = "VAULTSYNC_QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "VAULTSYNC_QDRANT_API_KEY", hide_env_values = true)]
    qdrant_api_key: Option<String>,

    /// Per-request timeout for Qdrant, in seconds
    #[arg(long, env = "VAULTSYNC_REQUEST_TIMEOUT", default_value = "30")]
    request_timeout_secs: u64,

    /// Attempts per Qdrant request
    #[arg(long, env = "VAULTSYNC_MAX_RETRIES", default_value = "3")]
    max_retries: usize,

    /// Directory containing the ONNX model and tokenizer.json
    #[arg(long, env = "VAULTSYNC_MODEL_DIR", default_value = "./models")]
    model_dir: PathBuf,

    /// Number of embedding worker threads
    #[arg(long, env = "VAULTSYNC_EMBEDDING_THREADS", default_value = "4")]
    embedding_threads: usize,

    /// Texts per embedding batch
    #[arg(long, env = "VAULTSYNC_EMBED_BATCH_SIZE", default_value = "64")]
    embed_batch_size: usize,

    /// Named-vector key written on every point
    #[arg(long, env = "VAULTSYNC_VECTOR_NAME", default_value = vaultsync::config::DEFAULT_VECTOR_NAME)]
    vector_name: String,

    /// Maximum chunk length in characters
    #[arg(long, env = "VAULTSYNC_MAX_CHUNK_CHARS", default_value = "800")]
    max_chunk_chars: usize,

    /// Chunks at or below this length are dropped
    #[arg(long, env = "VAULTSYNC_MIN_CHUNK_CHARS", default_value = "30")]
    min_chunk_chars: usize,

    /// Document file extensions
    #[arg(long, env = "VAULTSYNC_EXTENSIONS", value_delimiter = ',', default_value = "md")]
    extensions: Vec<String>,

    /// Directory names never indexed (defaults to the Obsidian set)
    #[arg(long, env = "VAULTSYNC_SKIP_DIRS", value_delimiter = ',')]
    skip_dirs: Vec<String>,

    /// Top-level folders routed to the restricted collection
    #[arg(long, env = "VAULTSYNC_RESTRICTED_PREFIXES", value_delimiter = ',')]
    restricted_prefixes: Vec<String>,

    /// Collection for documents under a restricted prefix
    #[arg(long, env = "VAULTSYNC_RESTRICTED_COLLECTION", default_value = "work")]
    restricted_collection: String,

    /// Collection for all other documents
    #[arg(long, env = "VAULTSYNC_DEFAULT_COLLECTION", default_value = "personal")]
    default_collection: String,

    /// Honour .gitignore and .ignore files in the vault
    #[arg(long, env = "VAULTSYNC_RESPECT_IGNORE_FILES")]
    respect_ignore_files: bool,

    /// Ignore prior state and reprocess every document
    #[arg(long, env = "VAULTSYNC_FORCE")]
    force: bool,

    /// Log what would change without writing anything
    #[arg(long, env = "VAULTSYNC_DRY_RUN")]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VAULTSYNC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "VAULTSYNC_LOG_JSON")]
    log_json: bool,

    /// Write Prometheus metrics to this file after the pass
    #[arg(long, env = "VAULTSYNC_METRICS_FILE")]
    metrics_file: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Config {
        let skip_dirs = if self.skip_dirs.is_empty() {
            DEFAULT_SKIP_DIRS.iter().map(|s| (*s).to_string()).collect()
        } else {
            self.skip_dirs
        };

        Config {
            root: self.root,
            state_file: self.state_file,
            qdrant_url: self.qdrant_url,
            qdrant_api_key: self.qdrant_api_key,
            request_timeout_secs: self.request_timeout_secs,
            max_retries: self.max_retries,
            model_dir: self.model_dir,
            embedding_threads: self.embedding_threads,
            embed_batch_size: self.embed_batch_size,
            vector_name: self.vector_name,
            max_chunk_chars: self.max_chunk_chars,
            min_chunk_chars: self.min_chunk_chars,
            extensions: self.extensions,
            skip_dirs,
            restricted_prefixes: self.restricted_prefixes,
            restricted_collection: self.restricted_collection,
            default_collection: self.default_collection,
            respect_ignore_files: self.respect_ignore_files,
            force: self.force,
            dry_run: self.dry_run,
            log_level: self.log_level,
            log_json: self.log_json,
            metrics_file: self.metrics_file,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("vaultsync v{} starting", env!("CARGO_PKG_VERSION"));

    match run(cli.into_config()).await {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync aborted");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<SyncReport> {
    config.validate()?;

    tracing::info!(
        root = %config.root.display(),
        state = %config.state_file.display(),
        qdrant = %config.qdrant_url,
        "Configuration loaded"
    );

    init_metrics();

    let store = QdrantStore::connect(
        &config.qdrant_url,
        config.qdrant_api_key.as_deref(),
        Duration::from_secs(config.request_timeout_secs),
        config.max_retries,
    )
    .await?;

    let embeddings = EmbeddingService::new(EmbeddingConfig::from_model_dir(
        &config.model_dir,
        config.embedding_threads,
    ));
    embeddings.init().await?;

    let metrics_file = config.metrics_file.clone();
    let runner = Runner::new(config, Arc::new(embeddings), Arc::new(store))?;
    let report = runner.run().await?;

    if let Some(path) = metrics_file {
        if let Err(e) = write_metrics(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }

    Ok(report)
}
