//! Default collaborators
//!
//! Simple heuristics that make the workflow runnable end to end:
//!
//! - [`MarkerFileDetector`]: platform from build marker files
//! - [`MentionInterpreter`]: targets from files the request mentions

use crate::backend::{
    CollaboratorError, Detection, Interpretation, PlatformDetector, RequestInterpreter,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use ringfence_scope::{Mention, MentionScanner, ScopePath};
use ringfence_structure::{DirectoryTree, ExpectedLayout, ScanOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Marker file → platform, checked in order
const MARKERS: &[(&str, &str)] = &[
    ("pom.xml", "java-spring"),
    ("build.gradle", "java-spring"),
    ("build.gradle.kts", "java-spring"),
    ("go.mod", "go-service"),
    ("Cargo.toml", "rust-service"),
    ("pyproject.toml", "python-service"),
    ("requirements.txt", "python-service"),
    ("setup.py", "python-service"),
    ("package.json", "typescript-node"),
];

/// Detects the platform from marker files at the codebase root
#[derive(Debug, Clone, Default)]
pub struct MarkerFileDetector {
    layouts: BTreeMap<String, ExpectedLayout>,
}

impl MarkerFileDetector {
    /// Detector using the built-in layouts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `layout` instead of the built-in one for its platform
    #[must_use]
    pub fn with_layout(mut self, layout: ExpectedLayout) -> Self {
        self.layouts.insert(layout.platform.clone(), layout);
        self
    }

    fn layout_for(&self, platform: &str) -> Option<ExpectedLayout> {
        self.layouts
            .get(platform)
            .cloned()
            .or_else(|| ExpectedLayout::builtin(platform))
    }
}

#[async_trait]
impl PlatformDetector for MarkerFileDetector {
    async fn detect(&self, root: &Path) -> Result<Detection, CollaboratorError> {
        for (marker, platform) in MARKERS {
            if !tokio::fs::try_exists(root.join(marker)).await? {
                continue;
            }
            let Some(layout) = self.layout_for(platform) else {
                continue;
            };
            tracing::debug!(marker, platform, "platform detected");
            return Ok(Detection {
                platform: (*platform).to_string(),
                layout,
            });
        }
        Err(CollaboratorError::Failed(format!(
            "no known build marker under '{}'",
            root.display()
        )))
    }
}

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9]*[a-z][A-Za-z0-9]*\b")
        .unwrap_or_else(|e| panic!("invalid identifier pattern: {e}"))
});

const STOPWORDS: &[&str] = &[
    "Add", "Also", "An", "And", "Change", "Create", "Delete", "Ensure", "Extract", "Fix",
    "For", "Implement", "Introduce", "Make", "Move", "Please", "Refactor", "Remove", "Rename",
    "Replace", "The", "Then", "This", "Update", "Use", "When", "With",
];

/// Derives targets from the files a request mentions
///
/// Bare file names and base-name-only matches are kept only when they pick
/// out a single file.
/// Path-like tokens with a directory part that match nothing are taken as
/// files to create. When nothing is mentioned, files whose stem equals a
/// named entity are used instead.
#[derive(Debug, Clone, Default)]
pub struct MentionInterpreter {
    options: ScanOptions,
}

impl MentionInterpreter {
    /// Create interpreter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With scan options
    #[must_use]
    pub fn with_scan_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Capitalised identifiers in `request`, in order, without duplicates
    #[must_use]
    pub fn entities(request: &str) -> Vec<String> {
        let prose = strip_path_tokens(request);
        let mut seen = BTreeSet::new();
        IDENTIFIER
            .find_iter(&prose)
            .map(|m| m.as_str())
            .filter(|word| !STOPWORDS.contains(word))
            .filter(|word| seen.insert(*word))
            .map(String::from)
            .collect()
    }

    /// Interpret against an in-memory snapshot
    #[must_use]
    pub fn interpret_tree(request: &str, root: &ScopePath, tree: &DirectoryTree) -> Interpretation {
        let files: Vec<ScopePath> = tree.file_paths().map(|rel| rel.resolve(root)).collect();
        let scanner = MentionScanner::new(files.iter().map(ToString::to_string));

        let mut by_token: BTreeMap<String, Vec<Mention>> = BTreeMap::new();
        for mention in scanner.scan(request) {
            by_token.entry(mention.text.clone()).or_default().push(mention);
        }

        let mut targets: BTreeSet<ScopePath> = BTreeSet::new();
        for token in MentionScanner::tokens(request) {
            let Some(mentions) = by_token.get(token) else {
                if token.contains(['/', '\\']) {
                    targets.insert(ScopePath::parse(token).resolve(root));
                }
                continue;
            };
            let Some(best) = mentions.iter().map(|m| m.level).min() else {
                continue;
            };
            let hits: Vec<&Mention> = mentions.iter().filter(|m| m.level == best).collect();
            let weak = best.is_low_confidence() || ScopePath::parse(token).len() == 1;
            if weak && hits.len() > 1 {
                tracing::debug!(token, candidates = hits.len(), "ambiguous mention skipped");
                continue;
            }
            targets.extend(hits.into_iter().map(|m| m.reference.clone()));
        }

        let entities = Self::entities(request);
        if targets.is_empty() {
            targets.extend(
                files
                    .iter()
                    .filter(|f| f.file_stem().is_some_and(|s| entities.iter().any(|e| e == s)))
                    .cloned(),
            );
        }

        Interpretation {
            target_paths: targets.iter().map(ToString::to_string).collect(),
            entities,
        }
    }
}

#[async_trait]
impl RequestInterpreter for MentionInterpreter {
    async fn interpret(&self, request: &str, root: &Path) -> Result<Interpretation, CollaboratorError> {
        let options = self.options.clone();
        let owned_root = root.to_path_buf();
        let tree = tokio::task::spawn_blocking(move || DirectoryTree::scan(&owned_root, &options))
            .await
            .map_err(|e| CollaboratorError::Failed(format!("scan task failed: {e}")))?
            .map_err(|e| CollaboratorError::InvalidInput(e.to_string()))?;
        let interpretation = Self::interpret_tree(request, &ScopePath::from_path(root), &tree);
        tracing::debug!(
            targets = interpretation.target_paths.len(),
            entities = interpretation.entities.len(),
            "request interpreted"
        );
        Ok(interpretation)
    }
}

fn strip_path_tokens(text: &str) -> String {
    let mut prose = text.to_string();
    for token in MentionScanner::tokens(text) {
        prose = prose.replacen(token, " ", 1);
    }
    prose
}
