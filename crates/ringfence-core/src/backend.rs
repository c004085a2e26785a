//! Collaborator interfaces
//!
//! The orchestrator consumes four collaborators through these traits:
//!
//! - [`PlatformDetector`]: platform identifier and expected layout
//! - [`RequestInterpreter`]: target paths and entities from the request
//! - [`AgentBackend`]: the tool-using agent, one turn at a time
//! - [`ToolExecutor`]: the file-system tools, reached only after the guardrail
//!
//! [`ReplayBackend`] replays a recorded transcript, which is how the CLI
//! runs the workflow without a live model.

use crate::patch::Patch;
use crate::phase::Phase;
use async_trait::async_trait;
use parking_lot::Mutex;
use ringfence_guard::{AgentTurnInput, ToolCall, ToolKind};
use ringfence_scope::ScopePath;
use ringfence_structure::ExpectedLayout;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Collaborator failures
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// Input the collaborator cannot work with
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Anything else
    #[error("{0}")]
    Failed(String),

    /// File system failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Detected platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Platform identifier
    pub platform: String,
    /// Layout the codebase is expected to follow
    pub layout: ExpectedLayout,
}

/// Detects a codebase's platform
#[async_trait]
pub trait PlatformDetector: Send + Sync {
    /// Inspect `root`
    async fn detect(&self, root: &Path) -> Result<Detection, CollaboratorError>;
}

/// What a change request is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Files and directories the change is expected to touch
    pub target_paths: Vec<String>,
    /// Entities or capabilities mentioned
    #[serde(default)]
    pub entities: Vec<String>,
}

/// Interprets change requests
#[async_trait]
pub trait RequestInterpreter: Send + Sync {
    /// Interpret `request` against the codebase at `root`
    async fn interpret(&self, request: &str, root: &Path) -> Result<Interpretation, CollaboratorError>;
}

/// Input for one agent turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    /// Phase the turn belongs to
    pub phase: Phase,
    /// Turn number within the attempt, starting at 0
    pub turn: usize,
    /// Reminder-wrapped conversation
    pub input: AgentTurnInput,
}

/// One agent turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTurn {
    /// Agent prose
    #[serde(default)]
    pub message: String,
    /// Tool calls attempted, in order
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Extra target paths the agent proposes
    #[serde(default)]
    pub proposed_targets: Vec<String>,
    /// Whether the agent is done with the phase
    #[serde(default)]
    pub is_final: bool,
}

impl AgentTurn {
    /// Intermediate turn
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Final turn
    #[must_use]
    pub fn finish(message: impl Into<String>) -> Self {
        Self::new(message).into_final()
    }

    /// With a tool call
    #[must_use]
    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// With a proposed target
    #[must_use]
    pub fn with_proposed_target(mut self, path: impl Into<String>) -> Self {
        self.proposed_targets.push(path.into());
        self
    }

    /// Mark final
    #[inline]
    #[must_use]
    pub fn into_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Tool-calling agent
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Produce the next turn
    async fn next_turn(&self, request: AgentRequest) -> Result<AgentTurn, CollaboratorError>;
}

/// A guardrail-approved tool call
#[derive(Debug, Clone, Copy)]
pub struct ToolRequest<'a> {
    /// Call as the agent made it
    pub call: &'a ToolCall,
    /// Classified kind
    pub kind: ToolKind,
    /// Canonical target, when the call has one
    pub target: Option<&'a ScopePath>,
    /// Codebase root
    pub root: &'a ScopePath,
}

/// Result of executing a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Whether the tool succeeded
    pub success: bool,
    /// Text returned to the agent
    pub output: String,
    /// Staged change, for successful mutations
    pub patch: Option<Patch>,
}

impl ToolOutcome {
    /// Successful call
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            patch: None,
        }
    }

    /// Successful mutation
    #[must_use]
    pub fn staged(output: impl Into<String>, patch: Patch) -> Self {
        Self {
            success: true,
            output: output.into(),
            patch: Some(patch),
        }
    }

    /// Failed call
    #[must_use]
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            patch: None,
        }
    }
}

/// File-system tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute an approved call
    async fn execute(&self, request: ToolRequest<'_>) -> ToolOutcome;

    /// Discard anything staged by earlier calls
    async fn reset(&self) {}

    /// Write a patch to disk
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    async fn apply(&self, patch: &Patch) -> std::io::Result<()> {
        patch.write().await
    }
}

/// Recorded agent turns, per phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Phase name → turns in order
    pub phases: BTreeMap<String, Vec<AgentTurn>>,
}

/// Replays a [`Transcript`]
///
/// Turns of a phase are handed out in order across attempts. Once a phase
/// runs out, every further request gets a final turn with no tool calls.
#[derive(Debug, Default)]
pub struct ReplayBackend {
    transcript: Transcript,
    cursors: Mutex<HashMap<Phase, usize>>,
}

impl ReplayBackend {
    /// Create from a transcript
    #[must_use]
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Parse a JSON transcript
    ///
    /// # Errors
    /// Returns error on malformed JSON or unknown phase names
    pub fn from_json_str(source: &str) -> Result<Self, CollaboratorError> {
        let transcript: Transcript = serde_json::from_str(source)
            .map_err(|e| CollaboratorError::InvalidInput(format!("transcript: {e}")))?;
        if let Some(name) = transcript
            .phases
            .keys()
            .find(|name| Phase::from_name(name).is_none())
        {
            return Err(CollaboratorError::InvalidInput(format!(
                "transcript: unknown phase '{name}'"
            )));
        }
        Ok(Self::new(transcript))
    }

    /// Load a JSON transcript
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CollaboratorError> {
        let path = path.into();
        let source = std::fs::read_to_string(&path)?;
        Self::from_json_str(&source)
    }

    /// Turns handed out for `phase` so far
    #[must_use]
    pub fn replayed(&self, phase: Phase) -> usize {
        self.cursors.lock().get(&phase).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AgentBackend for ReplayBackend {
    async fn next_turn(&self, request: AgentRequest) -> Result<AgentTurn, CollaboratorError> {
        let turns = self.transcript.phases.get(request.phase.as_str());
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(request.phase).or_insert(0);
        let turn = turns.and_then(|t| t.get(*cursor)).cloned();
        *cursor += 1;
        Ok(turn.unwrap_or_else(|| AgentTurn::finish("transcript exhausted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(phase: Phase) -> AgentRequest {
        AgentRequest {
            phase,
            turn: 0,
            input: AgentTurnInput::default(),
        }
    }

    #[tokio::test]
    async fn replay_hands_out_turns_in_order() {
        let backend = ReplayBackend::from_json_str(
            &json!({
                "phases": {
                    "produce_edits": [
                        {"message": "writing", "tool_calls": [
                            {"name": "Write", "arguments": {"path": "a.txt", "content": "a"}}
                        ]},
                        {"message": "done", "is_final": true}
                    ]
                }
            })
            .to_string(),
        )
        .unwrap();

        let first = backend.next_turn(request(Phase::ProduceEdits)).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert!(!first.is_final);
        let second = backend.next_turn(request(Phase::ProduceEdits)).await.unwrap();
        assert!(second.is_final);
        let third = backend.next_turn(request(Phase::ProduceEdits)).await.unwrap();
        assert_eq!(third.message, "transcript exhausted");
        assert_eq!(backend.replayed(Phase::ProduceEdits), 3);

        let other = backend.next_turn(request(Phase::AssessImpact)).await.unwrap();
        assert!(other.is_final && other.tool_calls.is_empty());
    }

    #[test]
    fn unknown_phases_are_rejected() {
        let err = ReplayBackend::from_json_str(r#"{"phases": {"deploy": []}}"#).unwrap_err();
        assert!(err.to_string().contains("deploy"));
    }
}
