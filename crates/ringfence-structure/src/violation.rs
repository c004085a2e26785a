//! Violations and their weights

use ringfence_scope::ScopePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of structural violation, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required layer has no directory
    MissingLayer,
    /// A file sits outside the layer its declared symbol belongs to
    MisplacedFile,
    /// A secondary type is declared inside another type's body
    NestedDefinition,
    /// A file carries responsibilities of more than one layer
    MixedConcern,
}

impl ViolationKind {
    /// Severity when no override is configured
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            ViolationKind::MissingLayer
            | ViolationKind::MisplacedFile
            | ViolationKind::MixedConcern => Severity::High,
            ViolationKind::NestedDefinition => Severity::Medium,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::MissingLayer => write!(f, "missing-layer"),
            ViolationKind::MisplacedFile => write!(f, "misplaced-file"),
            ViolationKind::NestedDefinition => write!(f, "nested-definition"),
            ViolationKind::MixedConcern => write!(f, "mixed-concern"),
        }
    }
}

/// Violation severity, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic
    Low,
    /// Should be fixed
    Medium,
    /// Must be fixed
    High,
    /// Blocks edits until resolved
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Score penalty per severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    /// Critical penalty
    pub critical: u32,
    /// High penalty
    pub high: u32,
    /// Medium penalty
    pub medium: u32,
    /// Low penalty
    pub low: u32,
}

impl SeverityWeights {
    /// Penalty for a severity
    #[inline]
    #[must_use]
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 25,
            high: 15,
            medium: 5,
            low: 1,
        }
    }
}

/// One structural finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Kind
    pub kind: ViolationKind,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
    /// Path (relative to the codebase root) the finding concerns
    pub location: Option<ScopePath>,
}

impl Violation {
    /// Create violation with the kind's default severity
    #[must_use]
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            location: None,
        }
    }

    /// With location
    #[inline]
    #[must_use]
    pub fn at(mut self, location: ScopePath) -> Self {
        self.location = Some(location);
        self
    }

    /// With severity
    #[inline]
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Whether the violation blocks further edits
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights() {
        let w = SeverityWeights::default();
        assert_eq!(w.weight(Severity::Critical), 25);
        assert_eq!(w.weight(Severity::High), 15);
        assert_eq!(w.weight(Severity::Medium), 5);
        assert_eq!(w.weight(Severity::Low), 1);
    }

    #[test]
    fn default_severities() {
        assert_eq!(ViolationKind::MissingLayer.default_severity(), Severity::High);
        assert_eq!(ViolationKind::NestedDefinition.default_severity(), Severity::Medium);
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn display_includes_location() {
        let v = Violation::new(ViolationKind::MisplacedFile, "OrderService is outside service/")
            .at(ScopePath::parse("src/OrderService.java"));
        assert_eq!(
            v.to_string(),
            "[high] misplaced-file: OrderService is outside service/ (src/OrderService.java)"
        );
    }
}
