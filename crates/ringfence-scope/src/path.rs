//! Normalised filesystem paths
//!
//! Provides [`ScopePath`], the textual, segment-based path representation
//! every scope decision is made on. Normalisation collapses `.` and `..`,
//! unifies separators and drops trailing separators. Symlinks are never
//! followed: containment is decided on the text alone.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Normalised path as an ordered list of segments
///
/// # Examples
/// - `/repo/src/../src/model/` → `/repo/src/model`
/// - `.\src\model\Order.java` → `src/model/Order.java`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScopePath {
    absolute: bool,
    segments: Vec<String>,
}

impl ScopePath {
    /// Parse and normalise a raw path string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let unified = raw.trim().replace('\\', "/");
        let mut absolute = unified.starts_with('/');
        let mut segments: Vec<String> = Vec::new();

        for (idx, seg) in unified.split('/').enumerate() {
            match seg {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(last) if last != ".." && !is_drive(last) => {
                        segments.pop();
                    }
                    Some(last) if is_drive(last) => {}
                    _ if absolute => {}
                    _ => segments.push("..".to_string()),
                },
                other => {
                    if idx == 0 && is_drive(other) {
                        absolute = true;
                    }
                    segments.push(other.to_string());
                }
            }
        }

        Self { absolute, segments }
    }

    /// Build from a filesystem path
    #[inline]
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self::parse(&path.to_string_lossy())
    }

    /// Filesystem root (`/`)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self {
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// Whether the path is absolute
    #[inline]
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Whether the path is the filesystem root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.absolute && self.segments.iter().all(|s| is_drive(s))
    }

    /// Whether the path has no segments at all (`""` or `.`)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Resolve against a base directory
    ///
    /// Absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve(&self, base: &Self) -> Self {
        if self.absolute {
            return self.clone();
        }
        let mut joined = base.clone();
        for seg in &self.segments {
            if seg == ".." {
                match joined.segments.last() {
                    Some(last) if last != ".." && !is_drive(last) => {
                        joined.segments.pop();
                    }
                    Some(last) if is_drive(last) => {}
                    _ if joined.absolute => {}
                    _ => joined.segments.push(seg.clone()),
                }
            } else {
                joined.segments.push(seg.clone());
            }
        }
        joined
    }

    /// Parent path (if any segment remains)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            absolute: self.absolute,
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Last segment without its extension
    #[must_use]
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => Some(stem),
            _ => Some(name),
        }
    }

    /// Extension of the last segment (without the dot)
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Append a segment, returning a new path
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        Self::parse(segment).resolve(self)
    }

    /// Whether `self` is a segment-wise prefix of `other` (or equal)
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.absolute == other.absolute
            && self.segments.len() <= other.segments.len()
            && self.segments[..] == other.segments[..self.segments.len()]
    }

    /// Whether `other` is nested strictly below `self`
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.segments.len() < other.segments.len() && self.is_prefix_of(other)
    }

    /// Whether `suffix`'s segments form the tail of `self`'s segments
    #[must_use]
    pub fn ends_with(&self, suffix: &Self) -> bool {
        !suffix.segments.is_empty()
            && suffix.segments.len() <= self.segments.len()
            && self.segments[self.segments.len() - suffix.segments.len()..] == suffix.segments[..]
    }

    /// Whether `run`'s segments appear contiguously inside `self`
    #[must_use]
    pub fn contains_run(&self, run: &Self) -> bool {
        if run.segments.is_empty() || run.segments.len() > self.segments.len() {
            return false;
        }
        self.segments
            .windows(run.segments.len())
            .any(|window| window == run.segments.as_slice())
    }

    /// Path of `self` relative to `ancestor`
    ///
    /// # Errors
    /// Returns error if `self` is not below (or equal to) `ancestor`
    pub fn relative_to(&self, ancestor: &Self) -> Result<Self, PathError> {
        if !ancestor.is_prefix_of(self) {
            return Err(PathError::NotDescendant {
                path: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(Self {
            absolute: false,
            segments: self.segments[ancestor.segments.len()..].to_vec(),
        })
    }

    /// Convert to a filesystem path
    #[inline]
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.to_string())
    }
}

impl Display for ScopePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self.segments.join("/");
        let drive_first = self.segments.first().is_some_and(|s| is_drive(s));
        if self.absolute && !drive_first {
            write!(f, "/{joined}")
        } else if self.absolute && self.segments.len() == 1 {
            write!(f, "{joined}/")
        } else if joined.is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{joined}")
        }
    }
}

impl From<String> for ScopePath {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for ScopePath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<ScopePath> for String {
    fn from(path: ScopePath) -> Self {
        path.to_string()
    }
}

/// Errors related to scope paths
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Not a descendant path
    #[error("path '{path}' is not below '{ancestor}'")]
    NotDescendant {
        /// Offending path
        path: String,
        /// Expected ancestor
        ancestor: String,
    },
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_collapses_dots_and_trailing_separators() {
        let path = ScopePath::parse("/repo/src/../src/./model/");
        assert_eq!(path.to_string(), "/repo/src/model");
        assert!(path.is_absolute());
    }

    #[test]
    fn parse_unifies_backslashes() {
        let path = ScopePath::parse(r".\src\model\Order.java");
        assert_eq!(path.segments(), &["src", "model", "Order.java"]);
        assert!(!path.is_absolute());
    }

    #[test]
    fn parent_dir_cannot_escape_absolute_root() {
        let path = ScopePath::parse("/../../etc/passwd");
        assert_eq!(path.to_string(), "/etc/passwd");
    }

    #[test]
    fn leading_parent_dirs_are_kept_on_relative_paths() {
        let path = ScopePath::parse("../other/file.rs");
        assert_eq!(path.segments(), &["..", "other", "file.rs"]);
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let base = ScopePath::parse("/repo");
        let resolved = ScopePath::parse("src/../lib/a.rs").resolve(&base);
        assert_eq!(resolved.to_string(), "/repo/lib/a.rs");

        let escaped = ScopePath::parse("../../x").resolve(&base);
        assert_eq!(escaped.to_string(), "/x");
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = ScopePath::parse("/repo");
        let abs = ScopePath::parse("/elsewhere/a.rs");
        assert_eq!(abs.resolve(&base), abs);
    }

    #[test]
    fn windows_drive_is_absolute() {
        let path = ScopePath::parse(r"C:\repo\src");
        assert!(path.is_absolute());
        assert_eq!(path.to_string(), "C:/repo/src");
        assert!(ScopePath::parse("C:/").is_root());
    }

    #[test]
    fn root_and_empty() {
        assert!(ScopePath::parse("/").is_root());
        assert!(ScopePath::parse("").is_empty());
        assert!(ScopePath::parse("./").is_empty());
        assert_eq!(ScopePath::parse("").to_string(), ".");
    }

    #[test]
    fn file_name_stem_and_extension() {
        let path = ScopePath::parse("/repo/src/Order.java");
        assert_eq!(path.file_name(), Some("Order.java"));
        assert_eq!(path.file_stem(), Some("Order"));
        assert_eq!(path.extension(), Some("java"));

        let dotfile = ScopePath::parse("/repo/.env");
        assert_eq!(dotfile.extension(), None);
        assert_eq!(dotfile.file_stem(), Some(".env"));
    }

    #[test]
    fn prefix_is_segment_wise() {
        let dir = ScopePath::parse("/repo/src/model");
        assert!(dir.is_ancestor_of(&ScopePath::parse("/repo/src/model/A.java")));
        assert!(!dir.is_ancestor_of(&ScopePath::parse("/repo/src/models/A.java")));
        assert!(!dir.is_ancestor_of(&dir));
        assert!(dir.is_prefix_of(&dir));
    }

    #[test]
    fn suffix_and_runs() {
        let full = ScopePath::parse("/repo/src/model/Order.java");
        assert!(full.ends_with(&ScopePath::parse("model/Order.java")));
        assert!(!full.ends_with(&ScopePath::parse("odel/Order.java")));
        assert!(full.contains_run(&ScopePath::parse("src/model")));
        assert!(!full.contains_run(&ScopePath::parse("repo/model")));
    }

    #[test]
    fn relative_to_ancestor() {
        let full = ScopePath::parse("/repo/src/a.rs");
        let rel = full.relative_to(&ScopePath::parse("/repo")).unwrap();
        assert_eq!(rel.to_string(), "src/a.rs");
        assert!(full.relative_to(&ScopePath::parse("/other")).is_err());
    }

    #[test]
    fn string_form_round_trips() {
        let path = ScopePath::parse("/repo/./a.rs");
        let text = String::from(path.clone());
        assert_eq!(text, "/repo/a.rs");
        assert_eq!(ScopePath::from(text), path);
    }
}
