//! Workflow phases and their state machine
//!
//! Every phase moves `Pending → Running → {Success, Failed, TimedOut,
//! Cancelled}`. A retry re-enters through `Pending`; `Running → Running`
//! is illegal.

use ringfence_guard::PhaseAccess;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Detect the platform and scan the codebase
    UnderstandCodebase,
    /// Turn the change request into target paths
    InterpretRequest,
    /// Score the layout against the platform's expected layers
    ValidateStructure,
    /// Work through the refactor plan (clarification edge only)
    PlanRefactor,
    /// Read-only look at what the change touches
    AssessImpact,
    /// Stage edits
    ProduceEdits,
    /// Write staged edits to disk
    ApplyEdits,
}

impl Phase {
    /// Every phase, in declaration order
    pub const ALL: [Phase; 7] = [
        Phase::UnderstandCodebase,
        Phase::InterpretRequest,
        Phase::ValidateStructure,
        Phase::PlanRefactor,
        Phase::AssessImpact,
        Phase::ProduceEdits,
        Phase::ApplyEdits,
    ];

    /// Stable snake_case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::UnderstandCodebase => "understand_codebase",
            Phase::InterpretRequest => "interpret_request",
            Phase::ValidateStructure => "validate_structure",
            Phase::PlanRefactor => "plan_refactor",
            Phase::AssessImpact => "assess_impact",
            Phase::ProduceEdits => "produce_edits",
            Phase::ApplyEdits => "apply_edits",
        }
    }

    /// Parse a snake_case name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Whether the phase runs an agent loop
    #[inline]
    #[must_use]
    pub fn is_agent_bearing(self) -> bool {
        matches!(
            self,
            Phase::PlanRefactor | Phase::AssessImpact | Phase::ProduceEdits
        )
    }

    /// File access granted to the phase's agent
    #[must_use]
    pub fn access(self) -> PhaseAccess {
        match self {
            Phase::PlanRefactor | Phase::ProduceEdits => PhaseAccess::ReadWrite,
            _ => PhaseAccess::ReadOnly,
        }
    }

    /// Next phase on the linear path
    ///
    /// `PlanRefactor` is never reached this way; it always returns to
    /// `ValidateStructure`.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Phase::UnderstandCodebase => Some(Phase::InterpretRequest),
            Phase::InterpretRequest => Some(Phase::ValidateStructure),
            Phase::ValidateStructure => Some(Phase::AssessImpact),
            Phase::PlanRefactor => Some(Phase::ValidateStructure),
            Phase::AssessImpact => Some(Phase::ProduceEdits),
            Phase::ProduceEdits => Some(Phase::ApplyEdits),
            Phase::ApplyEdits => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Not started, or waiting for a retry
    Pending,
    /// In flight
    Running,
    /// Finished
    Success,
    /// Failed with an error
    Failed,
    /// Wall-clock budget exhausted
    TimedOut,
    /// Aborted by the caller
    Cancelled,
}

impl PhaseStatus {
    /// Whether the status ends an attempt
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, PhaseStatus::Pending | PhaseStatus::Running)
    }
}

/// Illegal phase status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal phase transition {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Current status
    pub from: PhaseStatus,
    /// Requested status
    pub to: PhaseStatus,
}

/// Validate a status change
///
/// # Errors
/// Returns error if `to` is not reachable from `from`
pub fn validate_transition(from: PhaseStatus, to: PhaseStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Statuses reachable from `from`
#[must_use]
pub fn allowed_transitions(from: PhaseStatus) -> Vec<PhaseStatus> {
    use PhaseStatus::{Cancelled, Failed, Pending, Running, Success, TimedOut};
    match from {
        Pending => vec![Running, Cancelled],
        Running => vec![Success, Failed, TimedOut, Cancelled],
        Failed | TimedOut => vec![Pending],
        Success | Cancelled => vec![],
    }
}

/// Status tracker for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCursor {
    phase: Phase,
    status: PhaseStatus,
}

impl PhaseCursor {
    /// Start in `Pending`
    #[must_use]
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Pending,
        }
    }

    /// Phase tracked
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns error (and leaves the status unchanged) on an illegal move
    pub fn advance(&mut self, to: PhaseStatus) -> Result<(), TransitionError> {
        validate_transition(self.status, to)?;
        tracing::trace!(phase = %self.phase, from = ?self.status, to = ?to, "phase status");
        self.status = to;
        Ok(())
    }
}

/// Finalized record of one phase attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase
    pub phase: Phase,
    /// Terminal status
    pub status: PhaseStatus,
    /// Attempt number, starting at 1
    pub attempts: u32,
    /// Phase output (null on failure)
    #[serde(default)]
    pub output: serde_json::Value,
    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseResult {
    /// Whether the attempt succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == PhaseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_name(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::from_name("deploy"), None);
    }

    #[test]
    fn only_agent_phases_are_agent_bearing() {
        let agents: Vec<Phase> = Phase::ALL.into_iter().filter(|p| p.is_agent_bearing()).collect();
        assert_eq!(
            agents,
            vec![Phase::PlanRefactor, Phase::AssessImpact, Phase::ProduceEdits]
        );
        assert_eq!(Phase::AssessImpact.access(), PhaseAccess::ReadOnly);
        assert_eq!(Phase::ProduceEdits.access(), PhaseAccess::ReadWrite);
    }

    #[test]
    fn retry_goes_through_pending() {
        let mut cursor = PhaseCursor::new(Phase::ProduceEdits);
        cursor.advance(PhaseStatus::Running).unwrap();
        assert!(cursor.advance(PhaseStatus::Running).is_err());
        cursor.advance(PhaseStatus::TimedOut).unwrap();
        assert!(cursor.advance(PhaseStatus::Running).is_err());
        cursor.advance(PhaseStatus::Pending).unwrap();
        cursor.advance(PhaseStatus::Running).unwrap();
        cursor.advance(PhaseStatus::Success).unwrap();
        assert!(cursor.status().is_terminal());
        assert!(allowed_transitions(PhaseStatus::Success).is_empty());
    }

    #[test]
    fn linear_path_skips_plan_refactor() {
        let mut path = vec![Phase::UnderstandCodebase];
        while let Some(next) = path.last().and_then(|p| p.next()) {
            path.push(next);
        }
        assert!(!path.contains(&Phase::PlanRefactor));
        assert_eq!(path.len(), 6);
        assert_eq!(Phase::PlanRefactor.next(), Some(Phase::ValidateStructure));
    }
}
