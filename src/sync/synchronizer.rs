//! Per-document reconciliation with the vector store.

use std::sync::Arc;

use super::identity::{document_hash, point_id, point_ids};
use super::scanner::Document;
use super::segmenter::{extract_title, Chunk, Segmenter, SegmenterConfig};
use crate::embeddings::Embedder;
use crate::error::EmbeddingError;
use crate::storage::StateEntry;
use crate::store::{Point, PointMetadata, PointPayload, VectorStore};
use crate::telemetry::{CHUNKS_UPSERTED, POINTS_DELETED};
use crate::Result;

/// Synchronizer options.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Segmentation limits.
    pub segmenter: SegmenterConfig,
    /// Named-vector key points are written under.
    pub vector_name: String,
    /// Log remote mutations instead of sending them.
    pub dry_run: bool,
    /// Maximum texts per embedder call.
    pub embed_batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            vector_name: crate::config::DEFAULT_VECTOR_NAME.to_string(),
            dry_run: false,
            embed_batch_size: 64,
        }
    }
}

/// Result of syncing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Points were written (or would have been, in dry-run).
    Indexed { entry: StateEntry, chunks: usize },
    /// Nothing survived segmentation; remote and state are left alone.
    Empty,
}

/// Embeds documents and reconciles their points.
pub struct Synchronizer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    segmenter: Segmenter,
    options: SyncOptions,
}

impl Synchronizer {
    /// Create a synchronizer.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            segmenter: Segmenter::new(options.segmenter),
            options,
        }
    }

    /// Dimension of the vectors this synchronizer writes.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Get the options.
    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Index a changed document into `collection`.
    ///
    /// Points recorded in `previous` are deleted from the collection they
    /// were written to before the new points are upserted.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, deletion or upsert fails.
    pub async fn sync_document(
        &self,
        doc: &Document,
        collection: &str,
        previous: Option<&StateEntry>,
    ) -> Result<DocumentOutcome> {
        let text = doc.text();
        let chunks = self.segmenter.segment(&text);

        if chunks.is_empty() {
            tracing::debug!("No chunks after segmentation");
            return Ok(DocumentOutcome::Empty);
        }

        let title = extract_title(&text, doc.file_name());
        let vectors = self.embed_chunks(&title, &chunks).await?;
        let points = self.build_points(doc, &title, collection, chunks, vectors);
        let count = points.len();

        if let Some(previous) = previous.filter(|p| p.chunks > 0) {
            let stale = point_ids(&doc.path, previous.chunks);
            if self.options.dry_run {
                tracing::info!(
                    collection = %previous.collection,
                    points = stale.len(),
                    "[dry-run] Would delete previous points"
                );
            } else {
                self.store.delete(&previous.collection, &stale).await?;
                POINTS_DELETED.inc_by(stale.len() as u64);
            }
        }

        if self.options.dry_run {
            tracing::info!(collection, chunks = count, "[dry-run] Would upsert points");
        } else {
            self.store.upsert(collection, points).await?;
            CHUNKS_UPSERTED.inc_by(count as u64);
        }

        tracing::info!(collection, chunks = count, "Indexed document");

        Ok(DocumentOutcome::Indexed {
            entry: StateEntry::new(document_hash(&doc.bytes), count, collection),
            chunks: count,
        })
    }

    /// Delete every point recorded for a vanished document.
    ///
    /// Returns the number of ids deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete request fails.
    pub async fn purge_document(&self, path: &str, entry: &StateEntry) -> Result<usize> {
        let ids = point_ids(path, entry.chunks);

        if self.options.dry_run {
            tracing::info!(
                path,
                collection = %entry.collection,
                points = ids.len(),
                "[dry-run] Would delete points of removed document"
            );
        } else if !ids.is_empty() {
            self.store.delete(&entry.collection, &ids).await?;
            POINTS_DELETED.inc_by(ids.len() as u64);
        }

        tracing::info!(path, collection = %entry.collection, points = ids.len(), "Deleted document");
        Ok(ids.len())
    }

    /// Embed `"{title}\n\n{chunk}"` for every chunk, in order.
    async fn embed_chunks(&self, title: &str, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<String> = chunks
            .iter()
            .map(|c| format!("{title}\n\n{}", c.text))
            .collect();

        let mut vectors = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.options.embed_batch_size.max(1)) {
            let embedded = self.embedder.embed(batch.to_vec()).await?;
            if embedded.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
        }

        tracing::debug!(count = vectors.len(), "Generated embeddings");
        Ok(vectors)
    }

    fn build_points(
        &self,
        doc: &Document,
        title: &str,
        collection: &str,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Vec<Point> {
        let total_chunks = chunks.len();
        let folder = doc.folder().to_string();
        let last_modified = doc.modified_rfc3339();

        chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Point {
                id: point_id(&doc.path, chunk.index),
                vector_name: self.options.vector_name.clone(),
                vector,
                payload: PointPayload {
                    document: chunk.text,
                    metadata: PointMetadata {
                        file_path: doc.path.clone(),
                        title: title.to_string(),
                        chunk_index: chunk.index,
                        total_chunks,
                        collection: collection.to_string(),
                        folder: folder.clone(),
                        last_modified: last_modified.clone(),
                    },
                },
            })
            .collect()
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("segmenter", &self.segmenter)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
