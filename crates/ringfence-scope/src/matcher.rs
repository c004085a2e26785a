//! Multi-level path matching
//!
//! Decides whether two path representations refer to the same file when they
//! may differ in root prefix, relativity or completeness. Levels are tried
//! from strongest to weakest and the first success wins.

use crate::path::ScopePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strength of a path match, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    /// Identical after normalisation
    Exact,
    /// One path is a segment-wise tail of the other
    Suffix,
    /// One path occurs as a contiguous run of segments inside the other
    Segment,
    /// Only the last segment agrees
    BaseName,
}

impl MatchLevel {
    /// Base-name matches are too weak to act on without corroboration
    #[inline]
    #[must_use]
    pub fn is_low_confidence(self) -> bool {
        matches!(self, MatchLevel::BaseName)
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchLevel::Exact => "exact",
            MatchLevel::Suffix => "suffix",
            MatchLevel::Segment => "segment",
            MatchLevel::BaseName => "basename",
        };
        f.write_str(label)
    }
}

/// Stateless multi-level matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct PathMatcher;

impl PathMatcher {
    /// Whether `candidate` refers to `reference` at any level
    #[inline]
    #[must_use]
    pub fn matches(candidate: &str, reference: &str) -> bool {
        Self::match_level(candidate, reference).is_some()
    }

    /// Strongest level at which the raw strings match
    #[must_use]
    pub fn match_level(candidate: &str, reference: &str) -> Option<MatchLevel> {
        Self::match_paths(&ScopePath::parse(candidate), &ScopePath::parse(reference))
    }

    /// Strongest level at which two normalised paths match
    #[must_use]
    pub fn match_paths(candidate: &ScopePath, reference: &ScopePath) -> Option<MatchLevel> {
        if candidate.is_empty() || reference.is_empty() {
            return None;
        }
        if candidate == reference {
            return Some(MatchLevel::Exact);
        }
        if candidate.ends_with(reference) || reference.ends_with(candidate) {
            return Some(MatchLevel::Suffix);
        }
        if candidate.contains_run(reference) || reference.contains_run(candidate) {
            return Some(MatchLevel::Segment);
        }
        match (candidate.file_name(), reference.file_name()) {
            (Some(a), Some(b)) if a == b => Some(MatchLevel::BaseName),
            _ => None,
        }
    }
}
