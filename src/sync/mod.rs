//! Incremental synchronization pipeline.
//!
//! This module provides:
//! - Tree scanning and document loading
//! - Heading-aware segmentation and deterministic point identity
//! - Collection routing and change detection against prior state
//! - Per-document reconciliation and the full-pass runner

mod detector;
mod identity;
mod report;
mod router;
mod runner;
mod scanner;
mod segmenter;
mod synchronizer;

pub use detector::{Change, ChangeDetector};
pub use identity::{document_hash, point_id, point_ids};
pub use report::{CollectionTotal, SyncReport, SyncStats};
pub use router::Router;
pub use runner::Runner;
pub use scanner::{load_document, scan, scan_async, Document, FileFilter, ScanSnapshot};
pub use segmenter::{extract_title, Chunk, Segmenter, SegmenterConfig};
pub use synchronizer::{DocumentOutcome, SyncOptions, Synchronizer};
