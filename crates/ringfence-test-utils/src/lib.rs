//! Testing utilities for the ringfence workspace
//!
//! Scripted collaborators and on-disk codebase fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use ringfence_core::{
    AgentBackend, AgentRequest, AgentTurn, CollaboratorError, Detection, Interpretation, Patch,
    Phase, PlatformDetector, RequestInterpreter, ToolExecutor, ToolOutcome, ToolRequest,
    WorkspaceTools,
};
use ringfence_guard::ToolCall;
use ringfence_structure::ExpectedLayout;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// One scripted backend response
#[derive(Debug, Clone)]
pub enum Step {
    Turn(AgentTurn),
    Fail(String),
    Delay(Duration, AgentTurn),
}

/// Agent backend that plays per-phase scripts
///
/// Once a phase's script runs out every further request gets a final turn
/// with no tool calls.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    steps: Mutex<HashMap<Phase, VecDeque<Step>>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_step(mut self, phase: Phase, step: Step) -> Self {
        self.steps.get_mut().entry(phase).or_default().push_back(step);
        self
    }

    #[must_use]
    pub fn with_turn(self, phase: Phase, turn: AgentTurn) -> Self {
        self.with_step(phase, Step::Turn(turn))
    }

    #[must_use]
    pub fn with_failure(self, phase: Phase, message: &str) -> Self {
        self.with_step(phase, Step::Fail(message.to_string()))
    }

    #[must_use]
    pub fn with_delay(self, phase: Phase, delay: Duration, turn: AgentTurn) -> Self {
        self.with_step(phase, Step::Delay(delay, turn))
    }

    /// Requests received for `phase`
    pub fn calls(&self, phase: Phase) -> usize {
        self.requests.lock().iter().filter(|r| r.phase == phase).count()
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn next_turn(&self, request: AgentRequest) -> Result<AgentTurn, CollaboratorError> {
        let phase = request.phase;
        self.requests.lock().push(request);
        let step = self.steps.lock().get_mut(&phase).and_then(VecDeque::pop_front);
        match step {
            Some(Step::Turn(turn)) => Ok(turn),
            Some(Step::Fail(message)) => Err(CollaboratorError::Failed(message)),
            Some(Step::Delay(delay, turn)) => {
                tokio::time::sleep(delay).await;
                Ok(turn)
            }
            None => Ok(AgentTurn::finish("script exhausted")),
        }
    }
}

/// Write call with full content
pub fn write_call(path: &str, content: &str) -> ToolCall {
    ToolCall::new("Write", json!({ "file_path": path, "content": content }))
}

/// Read call
pub fn read_call(path: &str) -> ToolCall {
    ToolCall::new("Read", json!({ "file_path": path }))
}

/// A turn whose only action is one write
pub fn write_turn(path: &str, content: &str) -> AgentTurn {
    AgentTurn::new(format!("writing {path}")).with_tool_call(write_call(path, content))
}

/// Detector that always answers the same
#[derive(Debug, Clone)]
pub struct FixedDetector {
    detection: Detection,
}

impl FixedDetector {
    /// Built-in layout for `platform`, or an empty one
    pub fn new(platform: &str) -> Self {
        let layout =
            ExpectedLayout::builtin(platform).unwrap_or_else(|| ExpectedLayout::new(platform));
        Self::with_layout(layout)
    }

    pub fn with_layout(layout: ExpectedLayout) -> Self {
        Self {
            detection: Detection {
                platform: layout.platform.clone(),
                layout,
            },
        }
    }
}

#[async_trait]
impl PlatformDetector for FixedDetector {
    async fn detect(&self, _root: &Path) -> Result<Detection, CollaboratorError> {
        Ok(self.detection.clone())
    }
}

/// Interpreter that always answers the same
#[derive(Debug, Clone, Default)]
pub struct FixedInterpreter {
    interpretation: Interpretation,
}

impl FixedInterpreter {
    pub fn new<S: Into<String>>(targets: impl IntoIterator<Item = S>) -> Self {
        Self {
            interpretation: Interpretation {
                target_paths: targets.into_iter().map(Into::into).collect(),
                entities: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn with_entities<S: Into<String>>(mut self, entities: impl IntoIterator<Item = S>) -> Self {
        self.interpretation.entities = entities.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl RequestInterpreter for FixedInterpreter {
    async fn interpret(&self, _request: &str, _root: &Path) -> Result<Interpretation, CollaboratorError> {
        Ok(self.interpretation.clone())
    }
}

/// Workspace tools that cancel a token after a number of applied patches
#[derive(Debug)]
pub struct CancelAfterApplies {
    inner: WorkspaceTools,
    token: CancellationToken,
    after: usize,
    applied: Mutex<usize>,
}

impl CancelAfterApplies {
    pub fn new(token: CancellationToken, after: usize) -> Self {
        Self {
            inner: WorkspaceTools::new(),
            token,
            after,
            applied: Mutex::new(0),
        }
    }

    pub fn applied(&self) -> usize {
        *self.applied.lock()
    }
}

#[async_trait]
impl ToolExecutor for CancelAfterApplies {
    async fn execute(&self, request: ToolRequest<'_>) -> ToolOutcome {
        self.inner.execute(request).await
    }

    async fn reset(&self) {
        self.inner.reset().await;
    }

    async fn apply(&self, patch: &Patch) -> std::io::Result<()> {
        self.inner.apply(patch).await?;
        let mut applied = self.applied.lock();
        *applied += 1;
        if *applied == self.after {
            self.token.cancel();
        }
        Ok(())
    }
}

/// On-disk codebase in a temporary directory
#[derive(Debug)]
pub struct TempCodebase {
    dir: TempDir,
}

impl TempCodebase {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Under `parent` instead of the system temp directory
    pub fn new_in(parent: impl AsRef<Path>) -> Self {
        Self {
            dir: TempDir::new_in(parent).unwrap(),
        }
    }

    /// With a file (parents created)
    #[must_use]
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        self
    }

    /// With an empty directory
    #[must_use]
    pub fn dir(self, rel: &str) -> Self {
        std::fs::create_dir_all(self.dir.path().join(rel)).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `rel`
    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Absolute path of `rel` as a string
    pub fn abs(&self, rel: &str) -> String {
        self.join(rel).to_string_lossy().into_owned()
    }

    pub fn read(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.join(rel)).ok()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.join(rel).exists()
    }

    /// Layered Spring service with every expected layer present
    pub fn java_service() -> Self {
        Self::new().with_java_service()
    }

    /// Add the Spring service files
    #[must_use]
    pub fn with_java_service(self) -> Self {
        self.file("pom.xml", "<project/>")
            .file(
                "src/main/java/shop/controller/OrderController.java",
                "public class OrderController { }",
            )
            .file(
                "src/main/java/shop/service/OrderService.java",
                "public class OrderService { }",
            )
            .file(
                "src/main/java/shop/repository/OrderRepository.java",
                "public interface OrderRepository { }",
            )
            .file(
                "src/main/java/shop/model/Order.java",
                "public class Order { private long id; }",
            )
            .dir("src/main/java/shop/dto")
    }
}

impl Default for TempCodebase {
    fn default() -> Self {
        Self::new()
    }
}
