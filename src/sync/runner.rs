//! A full incremental sync pass.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use super::detector::{Change, ChangeDetector};
use super::identity::document_hash;
use super::report::{CollectionTotal, SyncReport, SyncStats};
use super::router::Router;
use super::scanner::{load_document, scan_async, FileFilter};
use super::segmenter::SegmenterConfig;
use super::synchronizer::{DocumentOutcome, SyncOptions, Synchronizer};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::SyncError;
use crate::storage::{StateStore, SyncState};
use crate::store::{CollectionSpec, VectorStore};
use crate::telemetry::{spans, SYNC_DURATION, TRACKED_DOCUMENTS};
use crate::Result;

/// Drives one pass over the source tree.
pub struct Runner {
    config: Config,
    router: Router,
    filter: FileFilter,
    state: StateStore,
    store: Arc<dyn VectorStore>,
    synchronizer: Synchronizer,
}

impl Runner {
    /// Create a runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        config.validate()?;

        let options = SyncOptions {
            segmenter: SegmenterConfig {
                max_chars: config.max_chunk_chars,
                min_chars: config.min_chunk_chars,
            },
            vector_name: config.vector_name.clone(),
            dry_run: config.dry_run,
            embed_batch_size: config.embed_batch_size,
        };

        Ok(Self {
            router: Router::from_config(&config),
            filter: FileFilter::from_config(&config),
            state: StateStore::new(&config.state_file),
            synchronizer: Synchronizer::new(embedder, Arc::clone(&store), options),
            store,
            config,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run one pass.
    ///
    /// Per-document failures are counted and never abort the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing, prior state cannot be loaded,
    /// a collection cannot be ensured, or the new state cannot be saved.
    pub async fn run(&self) -> Result<SyncReport> {
        let span = spans::pass_span(
            &self.config.root.display().to_string(),
            self.config.force,
            self.config.dry_run,
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<SyncReport> {
        let started = Instant::now();
        let root = self.config.root.as_path();

        if !root.is_dir() {
            return Err(SyncError::RootMissing(root.display().to_string()).into());
        }

        let prior = self.state.load()?;
        tracing::info!(
            root = %root.display(),
            tracked = prior.len(),
            force = self.config.force,
            dry_run = self.config.dry_run,
            "Starting sync pass"
        );

        self.ensure_collections().await?;

        let snapshot = scan_async(root, &self.filter, self.config.respect_ignore_files).await?;

        let mut stats = SyncStats::default();
        stats.record_skipped(snapshot.skipped);

        let detector = ChangeDetector::new(prior, self.config.force);
        let mut next = SyncState::new();

        for path in &snapshot.documents {
            self.process_document(root, path, &detector, &mut next, &mut stats)
                .instrument(spans::document_span(path))
                .await;
        }

        let present: HashSet<&str> = snapshot.documents.iter().map(String::as_str).collect();
        for (path, entry) in detector.deleted(&present) {
            let purged = self
                .synchronizer
                .purge_document(&path, &entry)
                .instrument(spans::document_span(&path))
                .await;
            match purged {
                Ok(_) => stats.record_deleted(),
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Failed to delete points of removed document");
                    stats.record_errored();
                    next.insert(path, entry);
                }
            }
        }

        if self.config.dry_run {
            tracing::info!(path = %self.state.path().display(), "[dry-run] State not saved");
        } else {
            self.state.save(&next)?;
        }

        let collections = self.collection_totals().await;

        let elapsed = started.elapsed();
        SYNC_DURATION.set(elapsed.as_secs_f64());
        TRACKED_DOCUMENTS.set(i64::try_from(next.len()).unwrap_or(i64::MAX));

        tracing::info!(
            indexed = stats.indexed,
            chunks = stats.chunks,
            unchanged = stats.unchanged,
            skipped = stats.skipped,
            errored = stats.errored,
            deleted = stats.deleted,
            duration_secs = elapsed.as_secs_f64(),
            "Sync pass complete"
        );

        Ok(SyncReport {
            stats,
            collections,
            tracked: next.len(),
            force: self.config.force,
            dry_run: self.config.dry_run,
        })
    }

    /// Read, classify and sync one document, recording the entry to keep.
    async fn process_document(
        &self,
        root: &Path,
        path: &str,
        detector: &ChangeDetector,
        next: &mut SyncState,
        stats: &mut SyncStats,
    ) {
        let carry_forward = |next: &mut SyncState| {
            if let Some(entry) = detector.previous(path) {
                next.insert(path.to_string(), entry.clone());
            }
        };

        let doc = match load_document(root, path).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read document");
                stats.record_errored();
                carry_forward(next);
                return;
            }
        };

        let hash = document_hash(&doc.bytes);
        let collection = self.router.route(path);

        let previous = match detector.classify(path, &hash) {
            Change::Unchanged(entry) => {
                tracing::trace!("Unchanged");
                next.insert(path.to_string(), entry);
                stats.record_unchanged();
                return;
            }
            Change::Changed { previous } => previous,
        };

        match self
            .synchronizer
            .sync_document(&doc, collection, previous.as_ref())
            .await
        {
            Ok(DocumentOutcome::Indexed { entry, chunks }) => {
                next.insert(path.to_string(), entry);
                stats.record_indexed(chunks);
            }
            Ok(DocumentOutcome::Empty) => {
                tracing::debug!("Skipping document without usable chunks");
                stats.record_skipped(1);
                carry_forward(next);
            }
            Err(e) => {
                tracing::error!(collection, error = %e, "Failed to sync document");
                stats.record_errored();
                carry_forward(next);
            }
        }
    }

    async fn ensure_collections(&self) -> Result<()> {
        if self.config.dry_run {
            tracing::info!("[dry-run] Skipping collection setup");
            return Ok(());
        }

        let spec = CollectionSpec::cosine(
            self.config.vector_name.clone(),
            self.synchronizer.dimension(),
        );
        for name in self.router.collections() {
            if self.store.ensure_collection(name, &spec).await? {
                tracing::info!(collection = name, "Created collection");
            }
        }
        Ok(())
    }

    async fn collection_totals(&self) -> Vec<CollectionTotal> {
        let mut totals = Vec::new();
        for name in self.router.collections() {
            let points = match self.store.point_count(name).await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!(collection = name, error = %e, "Could not fetch point count");
                    None
                }
            };
            totals.push(CollectionTotal {
                name: name.to_string(),
                points,
            });
        }
        totals
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("root", &self.config.root)
            .field("state", &self.state)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::PlaceholderEmbedder;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn runner(root: &Path, state: &Path, store: &Arc<MemoryStore>) -> Runner {
        let mut config = Config::for_root(root);
        config.state_file = state.to_path_buf();
        Runner::new(
            config,
            Arc::new(PlaceholderEmbedder::new(8)),
            Arc::clone(store) as Arc<dyn VectorStore>,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let runner = runner(&tmp.path().join("absent"), &tmp.path().join("s.json"), &store);

        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, crate::Error::Sync(SyncError::RootMissing(_))));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        fs::create_dir_all(&vault).unwrap();
        let state = tmp.path().join("state.json");
        fs::write(&state, "{not json").unwrap();
        let store = Arc::new(MemoryStore::new());

        let err = runner(&vault, &state, &store).run().await.unwrap_err();

        assert!(matches!(err, crate::Error::State(_)));
    }

    #[tokio::test]
    async fn test_ensure_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_operation("ensure_collection");

        let result = runner(tmp.path(), &tmp.path().join("s.json"), &store).run().await;

        assert!(result.is_err());
        assert!(!tmp.path().join("s.json").exists());
    }

    #[tokio::test]
    async fn test_point_count_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        fs::create_dir_all(&vault).unwrap();
        fs::write(vault.join("a.md"), "A note with enough text to be indexed here.").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_operation("point_count");

        let report = runner(&vault, &tmp.path().join("s.json"), &store)
            .run()
            .await
            .unwrap();

        assert_eq!(report.stats.indexed, 1);
        assert!(report.collections.iter().all(|c| c.points.is_none()));
    }

    #[tokio::test]
    async fn test_collections_ensured_up_front() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = runner(tmp.path(), &tmp.path().join("s.json"), &store)
            .run()
            .await
            .unwrap();

        assert!(store.has_collection("work"));
        assert!(store.has_collection("personal"));
        assert_eq!(
            report.collections,
            vec![
                CollectionTotal {
                    name: "work".to_string(),
                    points: Some(0),
                },
                CollectionTotal {
                    name: "personal".to_string(),
                    points: Some(0),
                },
            ]
        );
    }
}
