//! Change detection against the prior pass.

use std::collections::HashSet;

use crate::storage::{StateEntry, SyncState};

/// Classification of a document present in the current scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Content hash matches the recorded entry.
    Unchanged(StateEntry),
    /// New or modified; `previous` is the entry to reconcile against.
    Changed { previous: Option<StateEntry> },
}

/// Diffs the current tree against prior state.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    prior: SyncState,
    force: bool,
}

impl ChangeDetector {
    /// Create a detector over `prior`.
    ///
    /// In forced mode every document is changed with no previous entry and
    /// nothing is reported as deleted. Prior entries stay available through
    /// [`previous`](Self::previous) so failed documents keep them.
    #[must_use]
    pub fn new(prior: SyncState, force: bool) -> Self {
        if force && !prior.is_empty() {
            tracing::info!(entries = prior.len(), "Forced pass, reprocessing every document");
        }
        Self { prior, force }
    }

    /// Recorded entry for a path, whatever the mode.
    #[must_use]
    pub fn previous(&self, path: &str) -> Option<&StateEntry> {
        self.prior.get(path)
    }

    /// Classify a document by its content hash.
    #[must_use]
    pub fn classify(&self, path: &str, hash: &str) -> Change {
        if self.force {
            return Change::Changed { previous: None };
        }
        match self.prior.get(path) {
            Some(entry) if entry.hash == hash => Change::Unchanged(entry.clone()),
            previous => Change::Changed {
                previous: previous.cloned(),
            },
        }
    }

    /// Recorded documents missing from `present`, in path order.
    #[must_use]
    pub fn deleted(&self, present: &HashSet<&str>) -> Vec<(String, StateEntry)> {
        if self.force {
            return Vec::new();
        }
        self.prior
            .iter()
            .filter(|(path, _)| !present.contains(path.as_str()))
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect()
    }
}
