//! Error types for ringfence core
//!
//! Tool-call rejections never appear here: the guardrail turns them into
//! feedback for the agent and the phase carries on. Only phase-level
//! failures reach the orchestrator, and only configuration problems reach
//! the caller as errors; everything else ends up in the report.

use crate::config::ConfigError;
use crate::phase::{Phase, TransitionError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failure of one phase attempt
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    /// Rejections exceeded the threshold
    #[error("guardrail loop detected: {rejected} tool calls rejected (threshold {threshold})")]
    GuardrailLoop {
        /// Rejections in this attempt
        rejected: usize,
        /// Configured threshold
        threshold: usize,
    },

    /// Wall-clock budget exhausted
    #[error("phase timed out after {duration_secs}s")]
    Timeout {
        /// Budget in seconds
        duration_secs: u64,
    },

    /// Agent backend failed
    #[error("agent backend failed: {0}")]
    Backend(String),

    /// Agent never produced a final turn
    #[error("agent did not finish within {max_turns} turns")]
    TurnBudgetExhausted {
        /// Configured budget
        max_turns: usize,
    },

    /// Request, targets or codebase unusable
    #[error("invalid input: {0}")]
    UpstreamInput(String),

    /// Detector or interpreter failed
    #[error("collaborator failed: {0}")]
    Collaborator(String),

    /// File system failure
    #[error("i/o failure on '{path}': {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Cause
        #[source]
        source: std::io::Error,
    },

    /// Phase state machine misuse
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Caller cancelled the run
    #[error("workflow cancelled")]
    Cancelled,
}

impl PhaseError {
    /// Check if the attempt may be repeated with the same inputs
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GuardrailLoop { .. }
                | Self::Timeout { .. }
                | Self::Backend(_)
                | Self::TurnBudgetExhausted { .. }
        )
    }

    /// Check if the run was cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GuardrailLoop { .. } => "guardrail_loop",
            Self::Timeout { .. } => "timeout",
            Self::Backend(_) => "backend",
            Self::TurnBudgetExhausted { .. } => "turn_budget_exhausted",
            Self::UpstreamInput(_) => "upstream_input",
            Self::Collaborator(_) => "collaborator",
            Self::Io { .. } => "io",
            Self::Transition(_) => "transition",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Errors surfaced to callers of the workflow
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Codebase root missing or unreadable
    #[error("codebase root '{0}' is not a directory")]
    RootNotFound(PathBuf),
}

/// One link of a failure's reason chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Phase that failed
    pub phase: Phase,
    /// Attempt number, starting at 1
    pub attempt: u32,
    /// Error kind
    pub kind: String,
    /// Rendered error
    pub error: String,
    /// Whether the error was eligible for retry
    pub retryable: bool,
}

impl FailureReason {
    /// Record an error
    #[must_use]
    pub fn new(phase: Phase, attempt: u32, error: &PhaseError) -> Self {
        Self {
            phase,
            attempt,
            kind: error.kind().to_string(),
            error: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (attempt {}): {}", self.phase, self.attempt, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(PhaseError::GuardrailLoop { rejected: 11, threshold: 10 }.is_retryable());
        assert!(PhaseError::Timeout { duration_secs: 5 }.is_retryable());
        assert!(PhaseError::Backend("503".into()).is_retryable());
        assert!(PhaseError::TurnBudgetExhausted { max_turns: 3 }.is_retryable());
        assert!(!PhaseError::UpstreamInput("empty".into()).is_retryable());
        assert!(!PhaseError::Collaborator("x".into()).is_retryable());
        assert!(!PhaseError::Cancelled.is_retryable());
    }

    #[test]
    fn guardrail_loop_message() {
        let err = PhaseError::GuardrailLoop { rejected: 11, threshold: 10 };
        assert!(err.to_string().starts_with("guardrail loop detected"));
    }

    #[test]
    fn failure_reason_renders_the_chain_link() {
        let reason = FailureReason::new(
            Phase::InterpretRequest,
            1,
            &PhaseError::UpstreamInput("change request is empty".into()),
        );
        assert_eq!(
            reason.to_string(),
            "interpret_request (attempt 1): invalid input: change request is empty"
        );
        assert_eq!(reason.kind, "upstream_input");
        assert!(!reason.retryable);
    }
}
