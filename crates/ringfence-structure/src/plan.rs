//! Refactor plans
//!
//! A [`RefactorPlan`] is what it would take to bring a codebase in line with
//! its expected layout. All paths are relative to the codebase root.

use ringfence_scope::ScopePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pull a nested type out into its own file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Extraction {
    /// File that currently declares the type
    pub source_path: ScopePath,
    /// Nested type name
    pub symbol_name: String,
    /// File the type should live in
    pub target_path: ScopePath,
}

/// Move a file into its layer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileMove {
    /// Current location
    pub source_path: ScopePath,
    /// New location
    pub target_path: ScopePath,
}

/// Steps that resolve structural violations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorPlan {
    /// Layer directories to create
    pub directories_to_create: BTreeSet<ScopePath>,
    /// Nested types to extract
    pub extractions: Vec<Extraction>,
    /// Files to move
    pub moves: Vec<FileMove>,
}

impl RefactorPlan {
    /// Whether the plan has nothing to do
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories_to_create.is_empty() && self.extractions.is_empty() && self.moves.is_empty()
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.directories_to_create.len() + self.extractions.len() + self.moves.len()
    }

    /// Every path the plan reads or writes
    ///
    /// Directories keep a trailing `/` so a scope built from them treats them
    /// as directories whether or not they exist yet.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<String> {
        let mut paths: BTreeSet<String> = self
            .directories_to_create
            .iter()
            .map(|d| format!("{d}/"))
            .collect();
        for extraction in &self.extractions {
            paths.insert(extraction.source_path.to_string());
            paths.insert(extraction.target_path.to_string());
        }
        for file_move in &self.moves {
            paths.insert(file_move.source_path.to_string());
            paths.insert(file_move.target_path.to_string());
        }
        paths.into_iter().collect()
    }

    pub(crate) fn normalize(&mut self) {
        self.extractions.sort();
        self.extractions.dedup();
        self.moves.sort();
        self.moves.dedup();
    }

    /// Render as a numbered checklist
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = Vec::with_capacity(self.len());
        for dir in &self.directories_to_create {
            lines.push(format!("create directory {dir}/"));
        }
        for e in &self.extractions {
            lines.push(format!(
                "extract {} from {} into {}",
                e.symbol_name, e.source_path, e.target_path
            ));
        }
        for m in &self.moves {
            lines.push(format!("move {} to {}", m.source_path, m.target_path));
        }
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}. {line}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touched_paths_mark_directories() {
        let mut plan = RefactorPlan::default();
        plan.directories_to_create.insert(ScopePath::parse("src/dto"));
        plan.moves.push(FileMove {
            source_path: ScopePath::parse("src/OrderService.java"),
            target_path: ScopePath::parse("src/service/OrderService.java"),
        });
        assert_eq!(
            plan.touched_paths(),
            vec![
                "src/OrderService.java".to_string(),
                "src/dto/".to_string(),
                "src/service/OrderService.java".to_string(),
            ]
        );
        assert_eq!(plan.len(), 2);
        assert!(plan.describe().starts_with("1. create directory src/dto/"));
    }

    #[test]
    fn empty_plan() {
        assert!(RefactorPlan::default().is_empty());
        assert_eq!(RefactorPlan::default().describe(), "");
    }
}
