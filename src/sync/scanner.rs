//! Document discovery.
//!
//! Walks the source tree and takes a snapshot of every document before any
//! of them is processed, so deletions are computed against a stable view.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Component, Path};

use chrono::{DateTime, SecondsFormat, Utc};
use ignore::WalkBuilder;

use crate::config::Config;
use crate::error::SyncError;
use crate::Result;

/// Extension and skip-directory filter.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
    skip_dirs: HashSet<String>,
}

impl FileFilter {
    /// Create a filter accepting `extensions` outside of `skip_dirs`.
    #[must_use]
    pub fn new<E, S>(extensions: E, skip_dirs: S) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            skip_dirs: skip_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a filter from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.extensions, config.skip_dirs.iter().cloned())
    }

    /// Check if a path has a document extension.
    #[must_use]
    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
    }

    /// Check if any directory component of a relative path is skipped.
    #[must_use]
    pub fn is_skipped(&self, rel_path: &Path) -> bool {
        rel_path.parent().is_some_and(|dir| {
            dir.components().any(|c| match c {
                Component::Normal(name) => self.skip_dirs.contains(name.to_string_lossy().as_ref()),
                _ => false,
            })
        })
    }
}

/// Documents present in the tree at scan time.
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    /// Sorted `/`-separated relative paths.
    pub documents: Vec<String>,
    /// Documents excluded by a skip directory.
    pub skipped: usize,
    /// Entries the walker could not read.
    pub errors: usize,
}

/// Scan `root` for documents.
///
/// # Errors
///
/// Returns an error if `root` is not a directory.
pub fn scan(root: &Path, filter: &FileFilter, respect_ignore_files: bool) -> Result<ScanSnapshot> {
    if !root.is_dir() {
        return Err(SyncError::RootMissing(root.display().to_string()).into());
    }

    tracing::info!(root = %root.display(), "Starting directory scan");

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(respect_ignore_files)
        .git_global(respect_ignore_files)
        .git_exclude(respect_ignore_files)
        .ignore(respect_ignore_files)
        .parents(respect_ignore_files)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut snapshot = ScanSnapshot::default();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                snapshot.errors += 1;
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };

        if !filter.is_document(rel) {
            continue;
        }

        if filter.is_skipped(rel) {
            tracing::trace!(path = %rel.display(), "Skipping excluded directory");
            snapshot.skipped += 1;
            continue;
        }

        snapshot.documents.push(relative_key(rel));
    }

    snapshot.documents.sort();

    tracing::info!(
        root = %root.display(),
        documents = snapshot.documents.len(),
        skipped = snapshot.skipped,
        errors = snapshot.errors,
        "Directory scan complete"
    );

    Ok(snapshot)
}

/// Async version of [`scan`].
///
/// # Errors
///
/// Returns an error if `root` is not a directory or the scan task fails.
pub async fn scan_async(
    root: &Path,
    filter: &FileFilter,
    respect_ignore_files: bool,
) -> Result<ScanSnapshot> {
    let root = root.to_path_buf();
    let filter = filter.clone();

    tokio::task::spawn_blocking(move || scan(&root, &filter, respect_ignore_files))
        .await
        .map_err(|e| crate::Error::internal(format!("Scan task failed: {e}")))?
}

/// Stable `/`-separated key for a relative path.
fn relative_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A document read from the tree.
#[derive(Debug, Clone)]
pub struct Document {
    /// `/`-separated path relative to the root.
    pub path: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

impl Document {
    /// Contents decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Containing folder, `.` at the root.
    #[must_use]
    pub fn folder(&self) -> &str {
        self.path.rsplit_once('/').map_or(".", |(dir, _)| dir)
    }

    /// Modification time as RFC 3339 in UTC.
    #[must_use]
    pub fn modified_rfc3339(&self) -> String {
        self.modified.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

/// Read the document at `rel_path` under `root`.
///
/// # Errors
///
/// Returns [`SyncError::ReadFailed`] if the file cannot be read.
pub async fn load_document(root: &Path, rel_path: &str) -> Result<Document> {
    let full = root.join(rel_path);
    let read_failed = |e: std::io::Error| SyncError::ReadFailed {
        path: rel_path.to_string(),
        reason: e.to_string(),
    };

    let bytes = tokio::fs::read(&full).await.map_err(read_failed)?;
    let modified = tokio::fs::metadata(&full)
        .await
        .map_err(read_failed)?
        .modified()
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);

    Ok(Document {
        path: rel_path.to_string(),
        bytes,
        modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn filter() -> FileFilter {
        FileFilter::new(["md"], [".obsidian", "attachments", "Templates"])
    }

    #[test]
    fn test_is_document() {
        let f = filter();
        assert!(f.is_document(Path::new("a.md")));
        assert!(f.is_document(Path::new("dir/B.MD")));
        assert!(!f.is_document(Path::new("image.png")));
        assert!(!f.is_document(Path::new("README")));
    }

    #[test]
    fn test_is_skipped_anywhere_in_path() {
        let f = filter();
        assert!(f.is_skipped(Path::new(".obsidian/workspace.md")));
        assert!(f.is_skipped(Path::new("projects/attachments/notes.md")));
        assert!(!f.is_skipped(Path::new("projects/notes.md")));
        // A file named like a skip dir is not itself skipped.
        assert!(!f.is_skipped(Path::new("Templates")));
        assert!(!f.is_skipped(Path::new("my-Templates/x.md")));
    }

    #[test]
    fn test_extension_normalization() {
        let f = FileFilter::new([".MD", "txt"], Vec::<String>::new());
        assert!(f.is_document(Path::new("a.md")));
        assert!(f.is_document(Path::new("a.txt")));
    }

    #[test]
    fn test_scan_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        fs::create_dir_all(root.join("notes/sub")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::create_dir_all(root.join("notes/attachments")).unwrap();
        fs::write(root.join("top.md"), "# Top").unwrap();
        fs::write(root.join("notes/b.md"), "b").unwrap();
        fs::write(root.join("notes/sub/a.md"), "a").unwrap();
        fs::write(root.join("notes/image.png"), [0u8; 4]).unwrap();
        fs::write(root.join(".obsidian/cache.md"), "x").unwrap();
        fs::write(root.join("notes/attachments/pasted.md"), "x").unwrap();

        let snapshot = scan(root, &filter(), false).unwrap();

        assert_eq!(
            snapshot.documents,
            vec!["notes/b.md", "notes/sub/a.md", "top.md"]
        );
        assert_eq!(snapshot.skipped, 2);
    }

    #[test]
    fn test_scan_includes_hidden_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".drafts")).unwrap();
        fs::write(tmp.path().join(".drafts/idea.md"), "idea").unwrap();

        let snapshot = scan(tmp.path(), &filter(), false).unwrap();
        assert_eq!(snapshot.documents, vec![".drafts/idea.md"]);
    }

    #[test]
    fn test_scan_respects_ignore_files_when_enabled() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".ignore"), "private.md\n").unwrap();
        fs::write(tmp.path().join("private.md"), "secret").unwrap();
        fs::write(tmp.path().join("public.md"), "hello").unwrap();

        let all = scan(tmp.path(), &filter(), false).unwrap();
        assert_eq!(all.documents.len(), 2);

        let filtered = scan(tmp.path(), &filter(), true).unwrap();
        assert_eq!(filtered.documents, vec!["public.md"]);
    }

    #[test]
    fn test_scan_missing_root() {
        let err = scan(Path::new("/definitely/not/here"), &filter(), false).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_scan_async() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "a").unwrap();

        let snapshot = scan_async(tmp.path(), &filter(), false).await.unwrap();
        assert_eq!(snapshot.documents, vec!["a.md"]);
    }

    #[tokio::test]
    async fn test_load_document() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("notes")).unwrap();
        fs::write(tmp.path().join("notes/a.md"), b"caf\xc3\xa9 \xff").unwrap();

        let doc = load_document(tmp.path(), "notes/a.md").await.unwrap();

        assert_eq!(doc.path, "notes/a.md");
        assert_eq!(doc.file_name(), "a.md");
        assert_eq!(doc.folder(), "notes");
        assert_eq!(doc.text(), "café \u{fffd}");
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let tmp = TempDir::new().unwrap();
        let err = load_document(tmp.path(), "gone.md").await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Sync(SyncError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_document_folder_at_root() {
        let doc = Document {
            path: "top.md".to_string(),
            bytes: Vec::new(),
            modified: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        };
        assert_eq!(doc.folder(), ".");
        assert_eq!(doc.file_name(), "top.md");
        assert_eq!(doc.modified_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
