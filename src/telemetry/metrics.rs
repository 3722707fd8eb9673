//! Prometheus metrics definitions.
//!
//! There is no HTTP endpoint; the registry is rendered in text exposition
//! format and written to a file after a pass, for a node-exporter textfile
//! collector to pick up.

use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Documents handled, by outcome.
pub static DOCUMENTS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vaultsync_documents_total",
        "Documents processed by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Points written to the vector store.
pub static CHUNKS_UPSERTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("vaultsync_chunks_upserted_total", "Chunks upserted as points").unwrap()
});

/// Point ids sent for deletion.
pub static POINTS_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("vaultsync_points_deleted_total", "Point ids sent for deletion").unwrap()
});

/// Vector store requests by operation and status.
pub static STORE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vaultsync_store_requests_total",
        "Vector store requests",
        &["operation", "status"]
    )
    .unwrap()
});

/// Embedding batch latency.
pub static EMBEDDING_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "vaultsync_embedding_batch_seconds",
        "Embedding batch latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

/// Embedding requests waiting for a worker.
pub static EMBEDDING_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vaultsync_embedding_queue_depth",
        "Number of embedding requests waiting for a worker"
    )
    .unwrap()
});

/// Documents tracked in state after the last pass.
pub static TRACKED_DOCUMENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vaultsync_tracked_documents",
        "Documents tracked in state after the last pass"
    )
    .unwrap()
});

/// Wall-clock duration of the last pass.
pub static SYNC_DURATION: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "vaultsync_last_pass_seconds",
        "Duration of the last sync pass in seconds"
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    let _ = &*DOCUMENTS_PROCESSED;
    let _ = &*CHUNKS_UPSERTED;
    let _ = &*POINTS_DELETED;
    let _ = &*STORE_REQUESTS;
    let _ = &*EMBEDDING_LATENCY;
    let _ = &*EMBEDDING_QUEUE_DEPTH;
    let _ = &*TRACKED_DOCUMENTS;
    let _ = &*SYNC_DURATION;

    tracing::debug!("Prometheus metrics initialized");
}

/// Render the default registry in text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn render_metrics() -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buf)
        .map_err(|e| Error::internal(format!("failed to encode metrics: {e}")))?;
    String::from_utf8(buf).map_err(|e| Error::internal(format!("metrics not UTF-8: {e}")))
}

/// Write rendered metrics to `path`, replacing it atomically.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub fn write_metrics(path: &Path) -> Result<()> {
    let rendered = render_metrics()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(rendered.as_bytes())?;
    tmp.persist(path)
        .map_err(|e| Error::internal(format!("failed to persist metrics: {}", e.error)))?;

    tracing::debug!(path = %path.display(), "Wrote metrics");
    Ok(())
}
