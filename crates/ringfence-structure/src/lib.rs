//! ringfence structure
//!
//! Scores how closely a codebase follows the layered layout its platform
//! expects, and plans the refactor that would close the gap.
//!
//! # Core Concepts
//!
//! - [`ExpectedLayout`] / [`LayerSpec`]: Layers, their directory names and type-name suffixes
//! - [`DirectoryTree`]: Snapshot of a codebase, scanned from disk or built in memory
//! - [`declarations`]: tree-sitter inspection of type nesting, HTTP handling and in-memory storage
//! - [`StructureComplianceScorer`]: Violations, a 0-100 score and a [`RefactorPlan`]
//!
//! # Example
//!
//! ```rust
//! use ringfence_structure::{DirectoryTree, ExpectedLayout, StructureComplianceScorer};
//!
//! let layout = ExpectedLayout::builtin("java-spring").unwrap();
//! let tree = DirectoryTree::new("/repo")
//!     .with_file("src/app/Order.java", "public class Order { static class Item {} }");
//!
//! let report = StructureComplianceScorer::default().score(&layout, &tree);
//! // five missing layers (15 each) and one nested type (5)
//! assert_eq!(report.score, 20);
//! assert_eq!(report.plan.directories_to_create.len(), 5);
//! ```

pub mod declarations;
pub mod layout;
pub mod plan;
pub mod scorer;
pub mod tree;
pub mod violation;

pub use declarations::{inspect, FileDeclarations, ParseError, SourceLanguage, TypeDeclaration};
pub use layout::{ExpectedLayout, LayerSpec};
pub use plan::{Extraction, FileMove, RefactorPlan};
pub use scorer::{needs_clarification, ComplianceReport, ScoringConfig, StructureComplianceScorer};
pub use tree::{DirectoryTree, ScanError, ScanOptions};
pub use violation::{Severity, SeverityWeights, Violation, ViolationKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
