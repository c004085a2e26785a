//! Workflow state
//!
//! One [`WorkflowState`] per run, owned by the orchestrator. Target paths
//! are kept normalised and deduplicated in first-seen order; the scope
//! policy is rebuilt from them whenever an agent phase starts.

use crate::patch::Patch;
use crate::phase::Phase;
use indexmap::{IndexMap, IndexSet};
use ringfence_scope::{absolute_root, ScopePath, ScopePolicy};
use ringfence_structure::{DirectoryTree, ExpectedLayout, RefactorPlan, Violation};
use serde::Serialize;
use std::path::PathBuf;

/// Mutable record of one workflow run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    /// Codebase root, always absolute
    pub codebase_root: PathBuf,
    /// Change request as given
    pub change_request: String,
    /// Platform identifier, once detected
    pub detected_platform: Option<String>,
    /// Layout the codebase is scored against
    pub expected_layout: Option<ExpectedLayout>,
    /// Normalised target paths (directories keep a trailing `/`)
    pub target_paths: IndexSet<String>,
    /// Entities named in the request
    pub entities: Vec<String>,
    /// Output of each phase's last successful attempt
    pub phase_outputs: IndexMap<Phase, serde_json::Value>,
    /// Violations from the latest scoring
    pub violations: Vec<Violation>,
    /// Score from the latest scoring
    pub compliance_score: Option<u8>,
    /// Plan from the latest scoring
    pub refactor_plan: Option<RefactorPlan>,
    /// Refactor-planning rounds taken
    pub clarification_rounds: u32,
    /// Patches produced but not yet written
    pub staged_patches: Vec<Patch>,
    /// Patches written, in order
    pub patches: Vec<Patch>,
    /// Staged patches already written by the apply phase
    pub applied_staged: usize,
    /// Attempts per phase
    pub attempt_counts: IndexMap<Phase, u32>,
    /// Latest snapshot; cleared when files change
    #[serde(skip)]
    pub tree: Option<DirectoryTree>,
}

impl WorkflowState {
    /// Fresh state for a run
    ///
    /// A relative root is made absolute against the current directory.
    #[must_use]
    pub fn new(codebase_root: impl Into<PathBuf>, change_request: impl Into<String>) -> Self {
        Self {
            codebase_root: absolute_root(&codebase_root.into()),
            change_request: change_request.into(),
            detected_platform: None,
            expected_layout: None,
            target_paths: IndexSet::new(),
            entities: Vec::new(),
            phase_outputs: IndexMap::new(),
            violations: Vec::new(),
            compliance_score: None,
            refactor_plan: None,
            clarification_rounds: 0,
            staged_patches: Vec::new(),
            patches: Vec::new(),
            applied_staged: 0,
            attempt_counts: IndexMap::new(),
            tree: None,
        }
    }

    /// Codebase root as a scope path
    #[must_use]
    pub fn root(&self) -> ScopePath {
        ScopePath::from_path(&self.codebase_root)
    }

    /// Merge target paths; returns how many were new
    pub fn add_targets<S: AsRef<str>>(&mut self, targets: &[S]) -> usize {
        let root = self.root();
        let before = self.target_paths.len();
        for raw in targets {
            if let Some(target) = normalize_target(&root, raw.as_ref()) {
                self.target_paths.insert(target);
            }
        }
        self.target_paths.len() - before
    }

    /// Scope policy over the current target paths
    #[must_use]
    pub fn policy(&self) -> ScopePolicy {
        let targets: Vec<&str> = self.target_paths.iter().map(String::as_str).collect();
        ScopePolicy::build(&self.codebase_root, &targets)
    }

    /// Count a new attempt; returns its number
    pub fn record_attempt(&mut self, phase: Phase) -> u32 {
        let count = self.attempt_counts.entry(phase).or_insert(0);
        *count += 1;
        *count
    }

    /// Attempts made so far
    #[must_use]
    pub fn attempts(&self, phase: Phase) -> u32 {
        self.attempt_counts.get(&phase).copied().unwrap_or(0)
    }

    /// Record a written patch
    pub fn record_applied(&mut self, patch: Patch) {
        tracing::info!(%patch, "patch applied");
        self.patches.push(patch);
    }

    /// Staged patches not yet written
    #[must_use]
    pub fn pending_patches(&self) -> &[Patch] {
        self.staged_patches.get(self.applied_staged..).unwrap_or_default()
    }

    /// Forget the directory snapshot
    pub fn invalidate_tree(&mut self) {
        self.tree = None;
    }
}

/// Normalise a target against the codebase root
///
/// Relative targets are resolved against the root; a trailing separator is
/// kept so the target still reads as a directory.
#[must_use]
pub fn normalize_target(root: &ScopePath, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let parsed = ScopePath::parse(trimmed);
    if parsed.is_empty() && !parsed.is_absolute() {
        return None;
    }
    let resolved = parsed.resolve(root);
    if resolved.is_root() {
        return None;
    }
    let is_dir = trimmed.ends_with('/') || trimmed.ends_with('\\');
    Some(if is_dir {
        format!("{resolved}/")
    } else {
        resolved.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchOperation;

    #[test]
    fn targets_are_normalised_and_deduplicated() {
        let mut state = WorkflowState::new("/repo", "add a DTO");
        let added = state.add_targets(&[
            "src/model/Order.java",
            "/repo/src/model/../model/Order.java",
            "src/dto/",
            "  ",
        ]);
        assert_eq!(added, 2);
        let targets: Vec<&str> = state.target_paths.iter().map(String::as_str).collect();
        assert_eq!(targets, vec!["/repo/src/model/Order.java", "/repo/src/dto/"]);
        assert_eq!(state.add_targets(&["src/model/Order.java"]), 0);
    }

    #[test]
    fn policy_follows_targets() {
        let mut state = WorkflowState::new("/repo", "x");
        assert!(state.policy().is_empty());
        state.add_targets(&["src/model/Order.java"]);
        let policy = state.policy();
        assert!(policy.is_allowed("/repo/src/model/NewDto.java"));
        assert!(!policy.is_allowed("/repo/src/controller/Other.java"));
    }

    #[test]
    fn relative_root_is_resolved_once() {
        let cwd = std::env::current_dir().unwrap();
        let mut state = WorkflowState::new("svc", "x");
        assert_eq!(state.codebase_root, cwd.join("svc"));

        state.add_targets(&["src/model/Order.java"]);
        let order = cwd.join("svc/src/model/Order.java");
        let expected = ScopePath::from_path(&order).to_string();
        assert_eq!(state.target_paths.first(), Some(&expected));

        let policy = state.policy();
        assert!(policy.is_allowed(&expected));
        assert!(policy.is_allowed(&cwd.join("svc/src/model/OrderDto.java").to_string_lossy()));
        assert!(!policy.is_allowed(&cwd.join("svc/svc/src/model/Order.java").to_string_lossy()));
    }

    #[test]
    fn pending_patches_skip_written_ones() {
        let mut state = WorkflowState::new("/repo", "x");
        for name in ["a", "b", "c"] {
            state.staged_patches.push(Patch::new(
                PatchOperation::Create,
                ScopePath::parse(&format!("/repo/{name}.txt")),
                name,
            ));
        }
        state.applied_staged = 2;
        assert_eq!(state.pending_patches().len(), 1);
        state.applied_staged = 3;
        assert!(state.pending_patches().is_empty());
    }

    #[test]
    fn attempts_are_counted_per_phase() {
        let mut state = WorkflowState::new("/repo", "x");
        assert_eq!(state.record_attempt(Phase::ProduceEdits), 1);
        assert_eq!(state.record_attempt(Phase::ProduceEdits), 2);
        assert_eq!(state.attempts(Phase::AssessImpact), 0);
    }
}
