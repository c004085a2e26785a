//! Directory tree snapshot
//!
//! The scorer works on a [`DirectoryTree`], an immutable snapshot of a
//! codebase's directories and source files with paths relative to the root.
//! Snapshots come from disk ([`DirectoryTree::scan`], honouring ignore files)
//! or are assembled in memory.

use crate::layout::ExpectedLayout;
use ignore::WalkBuilder;
use ringfence_scope::ScopePath;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Scan limits
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Files larger than this are listed but not read
    pub max_file_bytes: u64,
    /// Extensions whose contents are read (empty: every known language)
    pub source_extensions: Vec<String>,
    /// Directory names never descended into
    pub skip_dirs: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024,
            source_extensions: Vec::new(),
            skip_dirs: [
                "node_modules",
                "target",
                "build",
                "dist",
                "out",
                "vendor",
                "__pycache__",
                "venv",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ScanOptions {
    /// Options reading the source files of a layout
    #[must_use]
    pub fn for_layout(layout: &ExpectedLayout) -> Self {
        Self {
            source_extensions: layout.source_extensions.clone(),
            ..Self::default()
        }
    }

    /// With max file size
    #[inline]
    #[must_use]
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    fn reads(&self, path: &ScopePath) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        if self.source_extensions.is_empty() {
            return crate::declarations::SourceLanguage::from_extension(ext).is_some();
        }
        self.source_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Scan errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Root missing or not a directory
    #[error("codebase root '{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// Read failed
    #[error("failed to read '{path}': {source}")]
    Io {
        /// File
        path: PathBuf,
        /// Cause
        #[source]
        source: std::io::Error,
    },
}

/// Snapshot of directories and files under a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryTree {
    root: ScopePath,
    directories: BTreeSet<ScopePath>,
    files: BTreeMap<ScopePath, Option<String>>,
}

impl DirectoryTree {
    /// Empty in-memory tree
    #[must_use]
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: ScopePath::parse(root.as_ref()),
            directories: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }

    /// With a directory (and its ancestors)
    #[must_use]
    pub fn with_directory(mut self, path: &str) -> Self {
        self.add_directory(&ScopePath::parse(path));
        self
    }

    /// With a file and its content (ancestors are added)
    #[must_use]
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.add_file(ScopePath::parse(path), Some(content.into()));
        self
    }

    /// Add a directory and its ancestors
    pub fn add_directory(&mut self, path: &ScopePath) {
        let mut current = Some(path.clone());
        while let Some(dir) = current.filter(|d| !d.is_empty()) {
            current = dir.parent();
            self.directories.insert(dir);
        }
    }

    /// Add a file; `None` content means it was not read
    pub fn add_file(&mut self, path: ScopePath, content: Option<String>) {
        if let Some(parent) = path.parent() {
            self.add_directory(&parent);
        }
        self.files.insert(path, content);
    }

    /// Scan a directory on disk
    ///
    /// Hidden entries and ignore-file matches are skipped; so are the
    /// configured directories. Symlinks are not followed.
    ///
    /// # Errors
    /// Returns error if the root is not a directory or a source file cannot be read
    pub fn scan(root: impl AsRef<Path>, options: &ScanOptions) -> Result<Self, ScanError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut tree = Self {
            root: ScopePath::from_path(root),
            directories: BTreeSet::new(),
            files: BTreeMap::new(),
        };

        let skip = options.skip_dirs.clone();
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .follow_links(false)
            .git_ignore(true)
            .git_exclude(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && skip.iter().any(|s| entry.file_name() == s.as_str()))
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel = ScopePath::from_path(rel);
            if rel.is_empty() {
                continue;
            }
            let Some(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                tree.add_directory(&rel);
            } else if file_type.is_file() {
                let content = if options.reads(&rel) {
                    read_limited(entry.path(), options.max_file_bytes)?
                } else {
                    None
                };
                tree.add_file(rel, content);
            }
        }

        tracing::debug!(
            root = %tree.root,
            directories = tree.directories.len(),
            files = tree.files.len(),
            "codebase scanned"
        );
        Ok(tree)
    }

    /// Root the snapshot was taken under
    #[inline]
    #[must_use]
    pub fn root(&self) -> &ScopePath {
        &self.root
    }

    /// Relative directory paths
    #[inline]
    #[must_use]
    pub fn directories(&self) -> &BTreeSet<ScopePath> {
        &self.directories
    }

    /// Relative file paths with content (when read)
    pub fn files(&self) -> impl Iterator<Item = (&ScopePath, Option<&str>)> {
        self.files.iter().map(|(p, c)| (p, c.as_deref()))
    }

    /// Relative file paths
    pub fn file_paths(&self) -> impl Iterator<Item = &ScopePath> {
        self.files.keys()
    }

    /// Content of a file, if it was read
    #[must_use]
    pub fn content(&self, path: &ScopePath) -> Option<&str> {
        self.files.get(path).and_then(Option::as_deref)
    }

    /// Whether the tree has a file at `path`
    #[inline]
    #[must_use]
    pub fn contains_file(&self, path: &ScopePath) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files
    #[inline]
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn read_limited(path: &Path, limit: u64) -> Result<Option<String>, ScanError> {
    let meta = std::fs::metadata(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > limit {
        tracing::debug!(path = %path.display(), size = meta.len(), "skipping large file");
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_files_add_ancestor_directories() {
        let tree = DirectoryTree::new("/repo").with_file("src/model/Order.java", "class Order {}");
        assert!(tree.directories().contains(&ScopePath::parse("src")));
        assert!(tree.directories().contains(&ScopePath::parse("src/model")));
        assert_eq!(
            tree.content(&ScopePath::parse("src/model/Order.java")),
            Some("class Order {}")
        );
    }

    #[test]
    fn scan_reads_sources_and_skips_build_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/service")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/service/OrderService.ts"), "export class OrderService {}").unwrap();
        std::fs::write(root.join("README.md"), "# readme").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.ts"), "x").unwrap();

        let tree = DirectoryTree::scan(root, &ScanOptions::default()).unwrap();
        assert!(tree.directories().contains(&ScopePath::parse("src/service")));
        assert_eq!(
            tree.content(&ScopePath::parse("src/service/OrderService.ts")),
            Some("export class OrderService {}")
        );
        assert!(tree.contains_file(&ScopePath::parse("README.md")));
        assert_eq!(tree.content(&ScopePath::parse("README.md")), None);
        assert!(!tree.contains_file(&ScopePath::parse("node_modules/pkg/index.ts")));
    }

    #[test]
    fn scan_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            DirectoryTree::scan(&missing, &ScanOptions::default()),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn oversized_files_are_listed_unread() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        let tree = DirectoryTree::scan(dir.path(), &ScanOptions::default().with_max_file_bytes(10)).unwrap();
        let path = ScopePath::parse("big.py");
        assert!(tree.contains_file(&path));
        assert_eq!(tree.content(&path), None);
    }
}
