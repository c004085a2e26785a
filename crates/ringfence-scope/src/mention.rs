//! Textual file mentions
//!
//! Finds path-like tokens in free text (a change request, an agent's prose)
//! and resolves them against a set of reference files through
//! [`PathMatcher`].

use crate::matcher::{MatchLevel, PathMatcher};
use crate::path::ScopePath;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static PATH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[/\\]?(?:[A-Za-z0-9_.\-]+[/\\])*[A-Za-z0-9_\-]+\.[A-Za-z][A-Za-z0-9]{0,7}\b")
        .unwrap_or_else(|e| panic!("invalid path token pattern: {e}"))
});

/// A token in text that matched a reference file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Token as it appeared in the text
    pub text: String,
    /// Reference file it was matched to
    pub reference: ScopePath,
    /// Strength of the match
    pub level: MatchLevel,
}

/// Scans text for mentions of known files
#[derive(Debug, Clone, Default)]
pub struct MentionScanner {
    references: Vec<ScopePath>,
}

impl MentionScanner {
    /// Create scanner over reference files
    #[must_use]
    pub fn new<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            references: references
                .into_iter()
                .map(|r| ScopePath::parse(r.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Number of reference files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Whether there are no reference files
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Path-like tokens in `text`, in order of appearance
    #[must_use]
    pub fn tokens(text: &str) -> Vec<&str> {
        PATH_TOKEN.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Every (token, reference) pair that matches, in text order
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();
        for token in Self::tokens(text) {
            let candidate = ScopePath::parse(token);
            for reference in &self.references {
                if let Some(level) = PathMatcher::match_paths(&candidate, reference) {
                    mentions.push(Mention {
                        text: token.to_string(),
                        reference: reference.clone(),
                        level,
                    });
                }
            }
        }
        mentions
    }

    /// Best match level per mentioned reference
    #[must_use]
    pub fn mentioned(&self, text: &str) -> BTreeMap<ScopePath, MatchLevel> {
        let mut best: BTreeMap<ScopePath, MatchLevel> = BTreeMap::new();
        for mention in self.scan(text) {
            best.entry(mention.reference)
                .and_modify(|level| *level = (*level).min(mention.level))
                .or_insert(mention.level);
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> MentionScanner {
        MentionScanner::new([
            "/repo/src/model/Order.java",
            "/repo/src/controller/OrderController.java",
            "/repo/src/legacy/model/Order.java",
        ])
    }

    #[test]
    fn tokens_pick_up_paths_and_file_names() {
        let tokens = MentionScanner::tokens("Update src/model/Order.java and `Dto.java`, then stop.");
        assert_eq!(tokens, vec!["src/model/Order.java", "Dto.java"]);
        assert_eq!(
            MentionScanner::tokens("wrote /repo/src/dto/OrderDto.java"),
            vec!["/repo/src/dto/OrderDto.java"]
        );
    }

    #[test]
    fn suffix_mention_beats_basename_mention() {
        let found = scanner().mentioned("please change src/model/Order.java");
        assert_eq!(
            found.get(&ScopePath::parse("/repo/src/model/Order.java")),
            Some(&MatchLevel::Suffix)
        );
        assert_eq!(
            found.get(&ScopePath::parse("/repo/src/legacy/model/Order.java")),
            Some(&MatchLevel::BaseName)
        );
        assert!(!found.contains_key(&ScopePath::parse("/repo/src/controller/OrderController.java")));
    }

    #[test]
    fn bare_file_name_matches_every_same_named_file() {
        let mentions = scanner().scan("look at Order.java");
        assert_eq!(mentions.len(), 2);
    }

    #[test]
    fn prose_without_paths_has_no_mentions() {
        assert!(scanner().scan("add a discount to orders").is_empty());
    }
}
