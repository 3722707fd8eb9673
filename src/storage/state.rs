//! JSON state file for incremental syncing.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::models::SyncState;
use crate::error::StateError;
use crate::Result;

/// Loads and atomically saves the sync state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the state file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load prior state.
    ///
    /// A missing file is the first-run case and yields an empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No prior state, starting fresh");
            return Ok(SyncState::new());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let state: SyncState = serde_json::from_str(&raw).map_err(|e| StateError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %self.path.display(), entries = state.len(), "Loaded state");
        Ok(state)
    }

    /// Replace the state file with `state`.
    ///
    /// Writes to a temporary file in the same directory, syncs it and renames
    /// it over the target, so a crash leaves the previous snapshot intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let persist_err = |reason: String| StateError::Persist {
            path: self.path.display().to_string(),
            reason,
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, state).map_err(|e| persist_err(e.to_string()))?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| persist_err(e.error.to_string()))?;

        tracing::debug!(path = %self.path.display(), entries = state.len(), "Saved state");
        Ok(())
    }
}
