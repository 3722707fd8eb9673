//! Pass statistics and the end-of-run summary.

use std::fmt;

use crate::telemetry::DOCUMENTS_PROCESSED;

/// Counters for one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Documents whose points were (re)written.
    pub indexed: usize,
    /// Chunks produced by indexed documents.
    pub chunks: usize,
    /// Documents whose hash matched prior state.
    pub unchanged: usize,
    /// Documents in skip directories or with no usable chunks.
    pub skipped: usize,
    /// Documents that failed to read, embed or reconcile.
    pub errored: usize,
    /// Vanished documents whose points were purged.
    pub deleted: usize,
}

impl SyncStats {
    pub(crate) fn record_indexed(&mut self, chunks: usize) {
        self.indexed += 1;
        self.chunks += chunks;
        DOCUMENTS_PROCESSED.with_label_values(&["indexed"]).inc();
    }

    pub(crate) fn record_unchanged(&mut self) {
        self.unchanged += 1;
        DOCUMENTS_PROCESSED.with_label_values(&["unchanged"]).inc();
    }

    pub(crate) fn record_skipped(&mut self, count: usize) {
        self.skipped += count;
        DOCUMENTS_PROCESSED
            .with_label_values(&["skipped"])
            .inc_by(count as u64);
    }

    pub(crate) fn record_errored(&mut self) {
        self.errored += 1;
        DOCUMENTS_PROCESSED.with_label_values(&["errored"]).inc();
    }

    pub(crate) fn record_deleted(&mut self) {
        self.deleted += 1;
        DOCUMENTS_PROCESSED.with_label_values(&["deleted"]).inc();
    }
}

/// Point total of one collection after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTotal {
    pub name: String,
    /// `None` when the count could not be fetched.
    pub points: Option<u64>,
}

/// Outcome of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub stats: SyncStats,
    pub collections: Vec<CollectionTotal>,
    /// Documents tracked in state after the pass.
    pub tracked: usize,
    pub force: bool,
    pub dry_run: bool,
}

impl SyncReport {
    /// Whether any document failed.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.stats.errored > 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;

        writeln!(f, "--- Summary ---")?;
        if self.dry_run {
            writeln!(f, "Mode:      dry run (no changes written)")?;
        } else if self.force {
            writeln!(f, "Mode:      forced full reindex")?;
        }
        writeln!(f, "Indexed:   {} files ({} chunks)", s.indexed, s.chunks)?;
        writeln!(f, "Unchanged: {} files", s.unchanged)?;
        writeln!(f, "Skipped:   {} files", s.skipped)?;
        writeln!(f, "Errors:    {} files", s.errored)?;
        writeln!(f, "Deleted:   {} files", s.deleted)?;
        writeln!(f, "Tracked:   {} files", self.tracked)?;

        for total in &self.collections {
            match total.points {
                Some(points) => writeln!(f, "Collection '{}': {} points", total.name, points)?,
                None => writeln!(f, "Collection '{}': unavailable", total.name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SyncReport {
        SyncReport {
            stats: SyncStats {
                indexed: 3,
                chunks: 7,
                unchanged: 10,
                skipped: 2,
                errored: 1,
                deleted: 1,
            },
            collections: vec![
                CollectionTotal {
                    name: "work".to_string(),
                    points: Some(12),
                },
                CollectionTotal {
                    name: "personal".to_string(),
                    points: None,
                },
            ],
            tracked: 14,
            force: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_summary_rendering() {
        insta::assert_snapshot!(report().to_string(), @r"
        --- Summary ---
        Indexed:   3 files (7 chunks)
        Unchanged: 10 files
        Skipped:   2 files
        Errors:    1 files
        Deleted:   1 files
        Tracked:   14 files
        Collection 'work': 12 points
        Collection 'personal': unavailable
        ");
    }

    #[test]
    fn test_summary_dry_run() {
        let report = SyncReport {
            stats: SyncStats::default(),
            collections: Vec::new(),
            tracked: 0,
            force: true,
            dry_run: true,
        };
        insta::assert_snapshot!(report.to_string(), @r"
        --- Summary ---
        Mode:      dry run (no changes written)
        Indexed:   0 files (0 chunks)
        Unchanged: 0 files
        Skipped:   0 files
        Errors:    0 files
        Deleted:   0 files
        Tracked:   0 files
        ");
    }

    #[test]
    fn test_stats_recording() {
        let mut stats = SyncStats::default();
        stats.record_indexed(4);
        stats.record_indexed(2);
        stats.record_unchanged();
        stats.record_skipped(3);
        stats.record_errored();
        stats.record_deleted();

        assert_eq!(
            stats,
            SyncStats {
                indexed: 2,
                chunks: 6,
                unchanged: 1,
                skipped: 3,
                errored: 1,
                deleted: 1,
            }
        );
        assert!(report().has_errors());
    }
}
