//! Workflow report
//!
//! The one thing a run always returns, whatever happened. On failure it
//! still carries the partial state: patches already written, the latest
//! structure findings and the reason chain.

use crate::error::FailureReason;
use crate::patch::Patch;
use crate::phase::PhaseResult;
use crate::state::WorkflowState;
use ringfence_structure::{RefactorPlan, Violation};
use serde::Serialize;
use std::fmt;

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every phase succeeded
    Success,
    /// A phase failed past its retry budget
    Failed,
    /// A phase ran out of time on its last attempt
    TimedOut,
    /// The caller cancelled the run
    Cancelled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStatus::Success => "success",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::TimedOut => "timed_out",
            WorkflowStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Outcome of a workflow run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    /// Final status
    pub status: WorkflowStatus,
    /// Detected platform
    pub platform: Option<String>,
    /// Target paths the run was scoped to
    pub target_paths: Vec<String>,
    /// Patches written to disk, in order
    pub patches: Vec<Patch>,
    /// Patches produced but never written
    pub staged_patches: Vec<Patch>,
    /// Violations from the latest scoring
    pub violations: Vec<Violation>,
    /// Score from the latest scoring
    pub compliance_score: Option<u8>,
    /// Plan from the latest scoring
    pub refactor_plan: Option<RefactorPlan>,
    /// Tool calls the guardrail rejected, across all attempts
    pub rejected_tool_calls: usize,
    /// Every finalized phase attempt, in order
    pub phases: Vec<PhaseResult>,
    /// Reason chain, oldest first; empty on success
    pub failure: Vec<FailureReason>,
    /// Non-fatal findings
    pub warnings: Vec<String>,
}

impl WorkflowReport {
    /// Build from the final state
    #[must_use]
    pub fn from_state(status: WorkflowStatus, state: WorkflowState) -> Self {
        let staged_patches = state.pending_patches().to_vec();
        Self {
            status,
            platform: state.detected_platform,
            target_paths: state.target_paths.into_iter().collect(),
            patches: state.patches,
            staged_patches,
            violations: state.violations,
            compliance_score: state.compliance_score,
            refactor_plan: state.refactor_plan,
            rejected_tool_calls: 0,
            phases: Vec::new(),
            failure: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Whether the run succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }

    /// Last link of the reason chain
    #[must_use]
    pub fn root_cause(&self) -> Option<&FailureReason> {
        self.failure.last()
    }

    /// One-paragraph human summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "status: {}\npatches applied: {}\nrejected tool calls: {}",
            self.status,
            self.patches.len(),
            self.rejected_tool_calls
        );
        if let Some(score) = self.compliance_score {
            out.push_str(&format!("\ncompliance score: {score}"));
        }
        for reason in &self.failure {
            out.push_str(&format!("\nfailure: {reason}"));
        }
        for warning in &self.warnings {
            out.push_str(&format!("\nwarning: {warning}"));
        }
        out
    }
}
