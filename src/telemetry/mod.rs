//! Structured logging and metrics.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Prometheus counters for sync passes

mod metrics;

pub use metrics::{
    init_metrics, render_metrics, write_metrics, CHUNKS_UPSERTED, DOCUMENTS_PROCESSED,
    EMBEDDING_LATENCY, EMBEDDING_QUEUE_DEPTH, POINTS_DELETED, STORE_REQUESTS, SYNC_DURATION,
    TRACKED_DOCUMENTS,
};

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(false).compact();

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Span helpers for the sync pipeline.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span covering a whole sync pass.
    #[must_use]
    pub fn pass_span(root: &str, force: bool, dry_run: bool) -> Span {
        info_span!("sync_pass", root = %root, force, dry_run)
    }

    /// Span covering the work done for one document.
    #[must_use]
    pub fn document_span(path: &str) -> Span {
        info_span!("document", path = %path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_span() {
        let span = spans::pass_span("/vault", false, true);
        let _guard = span.enter();
    }

    #[test]
    fn test_document_span() {
        let span = spans::document_span("notes/a.md");
        let _guard = span.enter();
    }
}
