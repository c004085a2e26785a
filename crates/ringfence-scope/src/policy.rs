//! Scope policy - the allow-set of a phase
//!
//! A [`ScopePolicy`] is an immutable value built from the workflow's target
//! paths. It is rebuilt from scratch whenever the targets change and is never
//! mutated in place.
//!
//! # Construction rules
//! - Targets are resolved against the codebase root and normalised.
//! - A file target adds a File entry **and** its parent directory, so new
//!   sibling files (not yet on disk) are admitted.
//! - A directory target adds a Directory entry.
//! - Existence on disk only decides file-vs-directory, never inclusion: a
//!   target is a directory when written with a trailing separator or when it
//!   is a directory on disk. Anything else, `Dockerfile` included, is a file.
//! - Targets that normalise to nothing or to the filesystem root are dropped.
//!
//! An empty policy admits nothing.

use crate::matcher::{MatchLevel, PathMatcher};
use crate::path::ScopePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Absolute form of a codebase root
///
/// Relative roots are taken against the current directory; the path is not
/// canonicalised and symlinks are kept.
#[must_use]
pub fn absolute_root(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

/// One entry of the allow-set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ScopeEntry {
    /// A single file
    File(ScopePath),
    /// Everything strictly below a directory
    Directory(ScopePath),
}

impl ScopeEntry {
    /// Path of the entry
    #[inline]
    #[must_use]
    pub fn path(&self) -> &ScopePath {
        match self {
            ScopeEntry::File(p) | ScopeEntry::Directory(p) => p,
        }
    }
}

/// Which rule admitted a candidate path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Candidate equals a File entry
    File(ScopePath),
    /// Candidate is nested under a Directory entry
    WithinDirectory {
        /// Resolved candidate
        path: ScopePath,
        /// Directory entry that contains it
        directory: ScopePath,
    },
    /// Relative candidate is a segment-wise tail of exactly one File entry
    Suffix {
        /// The File entry it stands for
        file: ScopePath,
    },
}

impl Admission {
    /// Canonical absolute path the candidate refers to
    #[inline]
    #[must_use]
    pub fn path(&self) -> &ScopePath {
        match self {
            Admission::File(p) | Admission::WithinDirectory { path: p, .. } => p,
            Admission::Suffix { file } => file,
        }
    }
}

/// Immutable allow-set of files and directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopePolicy {
    root: ScopePath,
    files: BTreeSet<ScopePath>,
    directories: BTreeSet<ScopePath>,
}

impl ScopePolicy {
    /// Build a policy from target paths
    ///
    /// Never fails: malformed targets are skipped, and an empty result
    /// rejects everything.
    #[must_use]
    pub fn build<S: AsRef<str>>(root: impl AsRef<Path>, targets: &[S]) -> Self {
        let mut policy = Self::empty(root);

        for raw in targets {
            let raw = raw.as_ref();
            let parsed = ScopePath::parse(raw);
            if parsed.is_empty() && !parsed.is_absolute() {
                tracing::warn!(target_path = raw, "ignoring empty target path");
                continue;
            }
            let resolved = parsed.resolve(&policy.root);
            if resolved.is_root() {
                tracing::warn!(target_path = raw, "ignoring target that resolves to filesystem root");
                continue;
            }

            if denotes_directory(raw, &resolved) {
                policy.directories.insert(resolved);
            } else {
                if let Some(parent) = resolved.parent().filter(|p| !p.is_root()) {
                    policy.directories.insert(parent);
                }
                policy.files.insert(resolved);
            }
        }

        tracing::debug!(
            files = policy.files.len(),
            directories = policy.directories.len(),
            "scope policy built"
        );
        policy
    }

    /// Policy that admits nothing
    #[must_use]
    pub fn empty(root: impl AsRef<Path>) -> Self {
        Self {
            root: ScopePath::from_path(&absolute_root(root.as_ref())),
            files: BTreeSet::new(),
            directories: BTreeSet::new(),
        }
    }

    /// Whether `candidate` may be touched
    #[inline]
    #[must_use]
    pub fn is_allowed(&self, candidate: &str) -> bool {
        self.admit(candidate).is_some()
    }

    /// Decide whether `candidate` may be touched, and through which rule
    ///
    /// Relative candidates are resolved against the codebase root. When only
    /// the suffix rule admits a candidate, the returned path is the File entry
    /// it matched, not the naive resolution.
    #[must_use]
    pub fn admit(&self, candidate: &str) -> Option<Admission> {
        let raw = ScopePath::parse(candidate);
        if raw.is_empty() {
            return None;
        }
        let resolved = raw.resolve(&self.root);

        if self.files.contains(&resolved) {
            return Some(Admission::File(resolved));
        }
        if let Some(dir) = self.directories.iter().find(|d| d.is_ancestor_of(&resolved)) {
            return Some(Admission::WithinDirectory {
                directory: dir.clone(),
                path: resolved,
            });
        }
        if raw.is_absolute() {
            return None;
        }

        let mut tails = self.files.iter().filter(|file| {
            raw.len() <= file.len()
                && PathMatcher::match_paths(&raw, file) == Some(MatchLevel::Suffix)
        });
        match (tails.next(), tails.next()) {
            (Some(file), None) => Some(Admission::Suffix { file: file.clone() }),
            _ => None,
        }
    }

    /// Whether `candidate` names an allowed directory itself
    ///
    /// Listing or searching a directory of the allow-set is admitted even though only
    /// paths strictly below it are writable.
    #[must_use]
    pub fn covers_directory(&self, candidate: &str) -> bool {
        let raw = ScopePath::parse(candidate);
        let resolved = raw.resolve(&self.root);
        self.directories.contains(&resolved)
    }

    /// Resolve a candidate against the codebase root
    #[inline]
    #[must_use]
    pub fn resolve(&self, candidate: &str) -> ScopePath {
        ScopePath::parse(candidate).resolve(&self.root)
    }

    /// Codebase root the policy resolves against
    #[inline]
    #[must_use]
    pub fn root(&self) -> &ScopePath {
        &self.root
    }

    /// Allowed files
    #[inline]
    #[must_use]
    pub fn files(&self) -> &BTreeSet<ScopePath> {
        &self.files
    }

    /// Allowed directories (declared and derived)
    #[inline]
    #[must_use]
    pub fn directories(&self) -> &BTreeSet<ScopePath> {
        &self.directories
    }

    /// All entries, files first
    #[must_use]
    pub fn entries(&self) -> Vec<ScopeEntry> {
        self.files
            .iter()
            .cloned()
            .map(ScopeEntry::File)
            .chain(self.directories.iter().cloned().map(ScopeEntry::Directory))
            .collect()
    }

    /// Whether the policy admits nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }

    /// Human-readable rendering of the allow-set
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Allowed scope is empty: every file operation will be rejected.");
        }
        writeln!(f, "Allowed files:")?;
        if self.files.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for file in &self.files {
            writeln!(f, "  - {file}")?;
        }
        write!(f, "Allowed directories (new files may be created inside):")?;
        if self.directories.is_empty() {
            write!(f, "\n  (none)")?;
        }
        for dir in &self.directories {
            write!(f, "\n  - {dir}/")?;
        }
        Ok(())
    }
}

fn denotes_directory(raw: &str, resolved: &ScopePath) -> bool {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') || trimmed.ends_with('\\') {
        return true;
    }
    std::fs::metadata(resolved.to_path_buf()).is_ok_and(|meta| meta.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(targets: &[&str]) -> ScopePolicy {
        ScopePolicy::build("/repo", targets)
    }

    #[test]
    fn file_target_admits_itself_and_new_siblings() {
        let p = policy(&["/repo/src/model/Order.java"]);
        assert!(p.is_allowed("/repo/src/model/Order.java"));
        assert!(p.is_allowed("/repo/src/model/NewDto.java"));
        assert!(!p.is_allowed("/repo/src/controller/Other.java"));
    }

    #[test]
    fn relative_targets_resolve_against_root() {
        let p = policy(&["src/model/Order.java"]);
        assert!(p.files().contains(&ScopePath::parse("/repo/src/model/Order.java")));
        assert!(p.is_allowed("src/model/Dto.java"));
    }

    #[test]
    fn directory_targets_admit_nested_paths_only() {
        let p = policy(&["/repo/src/service/"]);
        assert!(p.is_allowed("/repo/src/service/OrderService.java"));
        assert!(p.is_allowed("/repo/src/service/impl/OrderServiceImpl.java"));
        assert!(!p.is_allowed("/repo/src/service"));
        assert!(p.covers_directory("/repo/src/service"));
        assert!(!p.is_allowed("/repo/src/services/X.java"));
    }

    #[test]
    fn extensionless_missing_target_is_a_file() {
        let p = policy(&["/repo/deploy/Dockerfile"]);
        assert!(p.files().contains(&ScopePath::parse("/repo/deploy/Dockerfile")));
        assert!(p.is_allowed("/repo/deploy/compose.yml"));

        let p = policy(&["/repo/src/dto/"]);
        assert!(p.directories().contains(&ScopePath::parse("/repo/src/dto")));
        assert!(p.files().is_empty());
    }

    #[test]
    fn traversal_does_not_escape_directory_entries() {
        let p = policy(&["/repo/src/model/Order.java"]);
        assert!(!p.is_allowed("/repo/src/model/../controller/A.java"));
        assert!(!p.is_allowed("src/model/../../etc/x.java"));
    }

    #[test]
    fn empty_targets_fail_closed() {
        let p = policy(&[]);
        assert!(p.is_empty());
        assert!(!p.is_allowed("/repo/anything.rs"));
        assert!(!p.is_allowed("anything.rs"));
    }

    #[test]
    fn root_and_blank_targets_are_dropped() {
        let p = policy(&["/", "", "  ", "."]);
        assert!(p.is_empty());
        assert!(!p.is_allowed("/etc/passwd"));
    }

    #[test]
    fn suffix_rule_maps_to_the_file_entry() {
        let p = policy(&["/repo/src/model/Order.java"]);
        let admission = p.admit("model/Order.java").unwrap();
        assert_eq!(admission.path(), &ScopePath::parse("/repo/src/model/Order.java"));
        assert!(matches!(admission, Admission::Suffix { .. }));
    }

    #[test]
    fn suffix_rule_rejects_ambiguous_and_absolute_candidates() {
        let p = policy(&["/repo/a/Order.java", "/repo/b/Order.java"]);
        assert!(p.admit("Order.java").is_none());
        assert!(!p.is_allowed("/elsewhere/a/Order.java"));
    }

    #[test]
    fn suffix_rule_needs_a_full_tail() {
        let p = policy(&["/repo/src/model/Order.java"]);
        assert!(p.admit("other/Order.java").is_none());
        assert!(p.admit("src/model").is_none());
        assert!(p.admit("repo/src/model/Order.java").is_some());
        assert!(p.admit("x/repo/src/model/Order.java").is_none());
    }

    #[test]
    fn summary_lists_files_and_directories() {
        let p = policy(&["/repo/src/model/Order.java"]);
        let text = p.summary();
        assert!(text.contains("/repo/src/model/Order.java"));
        assert!(text.contains("/repo/src/model/"));
        assert!(policy(&[]).summary().contains("empty"));
    }

    #[test]
    fn entries_list_files_then_directories() {
        let p = policy(&["/repo/src/model/Order.java"]);
        let entries = p.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], ScopeEntry::File(_)));
        assert!(matches!(entries[1], ScopeEntry::Directory(_)));
    }
}
