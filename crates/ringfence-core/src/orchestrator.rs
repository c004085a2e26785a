//! Phase orchestrator
//!
//! Drives one workflow run through its phases:
//!
//! ```text
//! understand_codebase → interpret_request → validate_structure
//!   → (plan_refactor → validate_structure)* → assess_impact
//!   → produce_edits → apply_edits
//! ```
//!
//! # Core Concepts
//!
//! - **Attempts**: each phase attempt runs under its wall-clock budget and
//!   the caller's cancellation token; transient failures are retried with
//!   the same inputs up to `max_retries` times.
//! - **Agent loop**: agent-bearing phases hand the agent a reminder-wrapped
//!   conversation every turn. Every tool call goes through a fresh
//!   [`ToolCallGuardrail`]; rejections are fed back as tool results and too
//!   many of them abort the attempt.
//! - **Routing**: after structure validation, [`route_after_validation`]
//!   decides whether to detour through refactor planning.

use crate::backend::{
    AgentBackend, AgentRequest, CollaboratorError, PlatformDetector, RequestInterpreter,
    ToolExecutor, ToolRequest,
};
use crate::collaborators::{MarkerFileDetector, MentionInterpreter};
use crate::config::{ClarificationConfig, WorkflowConfig};
use crate::error::{FailureReason, PhaseError, WorkflowError};
use crate::patch::Patch;
use crate::phase::{Phase, PhaseCursor, PhaseResult, PhaseStatus};
use crate::report::{WorkflowReport, WorkflowStatus};
use crate::state::WorkflowState;
use crate::tools::WorkspaceTools;
use parking_lot::Mutex;
use ringfence_guard::{
    AgentTurnInput, GuardrailDecision, IntentReminderInjector, ToolCallGuardrail, TurnMessage,
};
use ringfence_scope::{MentionScanner, ScopePolicy};
use ringfence_structure::{
    needs_clarification, DirectoryTree, ScanError, ScanOptions, StructureComplianceScorer,
    Violation,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where to go after structure validation
///
/// Refactor planning is taken while the structure needs clarification and
/// rounds remain; otherwise the workflow moves on to impact assessment.
#[must_use]
pub fn route_after_validation(
    violations: &[Violation],
    score: u8,
    clarification: &ClarificationConfig,
    rounds_taken: u32,
) -> Phase {
    if needs_clarification(violations, score, clarification.min_score)
        && rounds_taken < clarification.max_rounds
    {
        Phase::PlanRefactor
    } else {
        Phase::AssessImpact
    }
}

/// External collaborators of a run
#[derive(Clone)]
pub struct Collaborators {
    /// Platform detector
    pub detector: Arc<dyn PlatformDetector>,
    /// Request interpreter
    pub interpreter: Arc<dyn RequestInterpreter>,
    /// Agent backend
    pub backend: Arc<dyn AgentBackend>,
    /// File-system tools
    pub tools: Arc<dyn ToolExecutor>,
}

impl Collaborators {
    /// Default detector, interpreter and tools around `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            detector: Arc::new(MarkerFileDetector::new()),
            interpreter: Arc::new(MentionInterpreter::new()),
            backend,
            tools: Arc::new(WorkspaceTools::new()),
        }
    }

    /// With detector
    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn PlatformDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// With interpreter
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: Arc<dyn RequestInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// With tools
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = tools;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Runs workflows
#[derive(Debug)]
pub struct PhaseOrchestrator {
    config: WorkflowConfig,
    collaborators: Collaborators,
    scorer: StructureComplianceScorer,
    injector: IntentReminderInjector,
}

/// Bookkeeping that outlives individual attempts
#[derive(Debug, Default)]
struct RunLog {
    phases: Vec<PhaseResult>,
    failure: Vec<FailureReason>,
    warnings: Vec<String>,
    rejected: usize,
}

/// Per-attempt context, kept outside the attempt future so its counters
/// survive a timeout or cancellation
#[derive(Debug)]
struct AttemptContext {
    phase: Phase,
    guardrail: ToolCallGuardrail,
    warnings: Mutex<Vec<String>>,
    cancel: CancellationToken,
}

impl AttemptContext {
    fn warn(&self, warning: String) {
        tracing::warn!(phase = %self.phase, %warning, "phase warning");
        self.warnings.lock().push(warning);
    }
}

/// What the raced part of an attempt hands back
///
/// `writes` are committed after the race, so a dropped attempt future never
/// leaves a written file unrecorded.
#[derive(Debug, Default)]
struct Produced {
    output: Value,
    writes: Vec<Patch>,
}

impl From<Value> for Produced {
    fn from(output: Value) -> Self {
        Self {
            output,
            writes: Vec::new(),
        }
    }
}

/// What an agent loop produced
#[derive(Debug, Default)]
struct AgentOutcome {
    turns: usize,
    patches: Vec<Patch>,
    proposed_targets: Vec<String>,
}

impl PhaseOrchestrator {
    /// Create orchestrator
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: WorkflowConfig, collaborators: Collaborators) -> Result<Self, WorkflowError> {
        config.validate()?;
        Ok(Self {
            scorer: StructureComplianceScorer::new(config.scoring.clone()),
            config,
            collaborators,
            injector: IntentReminderInjector::new(),
        })
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run the workflow on `root`
    ///
    /// Phase failures, timeouts and cancellation end up in the report; only
    /// an unusable root is an error.
    ///
    /// A relative `root` is taken against the current directory, once, before
    /// any collaborator sees it.
    ///
    /// # Errors
    /// Returns error if `root` is not a directory
    #[tracing::instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub async fn run(
        &self,
        root: impl AsRef<Path>,
        request: &str,
        cancel: CancellationToken,
    ) -> Result<WorkflowReport, WorkflowError> {
        let root = root.as_ref();
        let is_dir = tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir());
        if !is_dir {
            return Err(WorkflowError::RootNotFound(root.to_path_buf()));
        }

        tracing::info!(request, "workflow started");
        let mut state = WorkflowState::new(root, request);
        tracing::debug!(root = %state.codebase_root.display(), "codebase root resolved");
        let mut log = RunLog::default();
        let mut status = WorkflowStatus::Success;

        let mut next = Some(Phase::UnderstandCodebase);
        while let Some(phase) = next {
            match self.run_phase(&mut state, &mut log, phase, &cancel).await {
                Ok(()) => next = self.next_phase(&mut state, &mut log, phase),
                Err(err) => {
                    status = match err {
                        PhaseError::Timeout { .. } => WorkflowStatus::TimedOut,
                        PhaseError::Cancelled => WorkflowStatus::Cancelled,
                        _ => WorkflowStatus::Failed,
                    };
                    break;
                }
            }
        }

        match status {
            WorkflowStatus::Success => tracing::info!(
                patches = state.patches.len(),
                rejected = log.rejected,
                "workflow finished"
            ),
            _ => tracing::error!(%status, patches = state.patches.len(), "workflow ended early"),
        }

        let mut report = WorkflowReport::from_state(status, state);
        report.phases = log.phases;
        report.failure = log.failure;
        report.warnings = log.warnings;
        report.rejected_tool_calls = log.rejected;
        Ok(report)
    }

    fn next_phase(&self, state: &mut WorkflowState, log: &mut RunLog, done: Phase) -> Option<Phase> {
        if done != Phase::ValidateStructure {
            return done.next();
        }
        let score = state.compliance_score.unwrap_or(100);
        let clarification = &self.config.clarification;
        let next = route_after_validation(
            &state.violations,
            score,
            clarification,
            state.clarification_rounds,
        );
        if next == Phase::PlanRefactor {
            state.clarification_rounds += 1;
            tracing::info!(round = state.clarification_rounds, score, "routing to refactor planning");
        } else if needs_clarification(&state.violations, score, clarification.min_score) {
            let warning = format!(
                "structure still needs clarification after {} round(s) (score {score}); proceeding",
                state.clarification_rounds
            );
            tracing::warn!(%warning, "clarification rounds exhausted");
            log.warnings.push(warning);
        }
        Some(next)
    }

    /// Run one phase through its retry budget
    async fn run_phase(
        &self,
        state: &mut WorkflowState,
        log: &mut RunLog,
        phase: Phase,
        cancel: &CancellationToken,
    ) -> Result<(), PhaseError> {
        let mut cursor = PhaseCursor::new(phase);
        let mut retried: Vec<FailureReason> = Vec::new();
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            state.record_attempt(phase);
            cursor.advance(PhaseStatus::Running)?;
            tracing::info!(%phase, attempt, "phase started");

            let ctx = AttemptContext {
                phase,
                guardrail: ToolCallGuardrail::new(self.config.guard).with_access(phase.access()),
                warnings: Mutex::new(Vec::new()),
                cancel: cancel.clone(),
            };
            let result = self.attempt(state, &ctx).await;
            log.rejected += ctx.guardrail.rejected();
            log.warnings.append(&mut ctx.warnings.lock());

            match result {
                Ok(output) => {
                    cursor.advance(PhaseStatus::Success)?;
                    tracing::info!(%phase, attempt, "phase succeeded");
                    log.warnings.extend(retried.iter().map(|r| format!("retried after {r}")));
                    log.phases.push(PhaseResult {
                        phase,
                        status: PhaseStatus::Success,
                        attempts: attempt,
                        output: output.clone(),
                        error: None,
                    });
                    state.phase_outputs.insert(phase, output);
                    return Ok(());
                }
                Err(err) => {
                    let status = match err {
                        PhaseError::Timeout { .. } => PhaseStatus::TimedOut,
                        PhaseError::Cancelled => PhaseStatus::Cancelled,
                        _ => PhaseStatus::Failed,
                    };
                    cursor.advance(status)?;
                    log.phases.push(PhaseResult {
                        phase,
                        status,
                        attempts: attempt,
                        output: Value::Null,
                        error: Some(err.to_string()),
                    });
                    let reason = FailureReason::new(phase, attempt, &err);

                    if err.is_retryable() && attempt < max_attempts && !cancel.is_cancelled() {
                        tracing::warn!(%phase, attempt, error = %err, "phase attempt failed; retrying");
                        retried.push(reason);
                        cursor.advance(PhaseStatus::Pending)?;
                        continue;
                    }

                    tracing::error!(%phase, attempt, error = %err, "phase failed");
                    log.failure.append(&mut retried);
                    log.failure.push(reason);
                    return Err(err);
                }
            }
        }
    }

    /// One attempt under the phase's budget
    ///
    /// Only the part that produces output is raced against cancellation and
    /// the timeout. File writes happen afterwards and check the token and
    /// the deadline between patches, so every written patch is recorded.
    #[tracing::instrument(skip_all, fields(phase = %ctx.phase))]
    async fn attempt(&self, state: &mut WorkflowState, ctx: &AttemptContext) -> Result<Value, PhaseError> {
        let budget = self.config.timeout_for(ctx.phase);
        let deadline = Instant::now() + budget;
        if ctx.phase == Phase::ApplyEdits {
            return self.apply_edits(state, ctx, deadline).await;
        }

        let produced = {
            let timed = async {
                tokio::time::timeout_at(deadline, self.execute(state, ctx))
                    .await
                    .unwrap_or(Err(PhaseError::Timeout {
                        duration_secs: budget.as_secs(),
                    }))
            };
            tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => Err(PhaseError::Cancelled),
                result = timed => result,
            }
        }?;

        if ctx.phase == Phase::PlanRefactor {
            self.commit_refactor(state, ctx, produced.writes).await?;
        }
        Ok(produced.output)
    }

    async fn execute(&self, state: &mut WorkflowState, ctx: &AttemptContext) -> Result<Produced, PhaseError> {
        match ctx.phase {
            Phase::UnderstandCodebase => self.understand_codebase(state).await.map(Produced::from),
            Phase::InterpretRequest => self.interpret_request(state).await.map(Produced::from),
            Phase::ValidateStructure => self.validate_structure(state).await.map(Produced::from),
            Phase::PlanRefactor => self.plan_refactor(state, ctx).await,
            Phase::AssessImpact => self.assess_impact(state, ctx).await.map(Produced::from),
            Phase::ProduceEdits => self.produce_edits(state, ctx).await.map(Produced::from),
            Phase::ApplyEdits => Err(PhaseError::Collaborator(
                "apply_edits writes outside the attempt race".into(),
            )),
        }
    }

    /// Fail the attempt if it was cancelled or ran past its deadline
    fn checkpoint(&self, ctx: &AttemptContext, deadline: Option<Instant>) -> Result<(), PhaseError> {
        if ctx.cancel.is_cancelled() {
            return Err(PhaseError::Cancelled);
        }
        match deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PhaseError::Timeout {
                duration_secs: self.config.timeout_for(ctx.phase).as_secs(),
            }),
            _ => Ok(()),
        }
    }

    async fn understand_codebase(&self, state: &mut WorkflowState) -> Result<Value, PhaseError> {
        let detection = self
            .collaborators
            .detector
            .detect(&state.codebase_root)
            .await
            .map_err(collaborator_error)?;
        let tree = scan(&state.codebase_root, ScanOptions::for_layout(&detection.layout)).await?;

        let output = json!({
            "platform": detection.platform,
            "files": tree.file_count(),
            "directories": tree.directories().len(),
        });
        state.detected_platform = Some(detection.platform);
        state.expected_layout = Some(detection.layout);
        state.tree = Some(tree);
        Ok(output)
    }

    async fn interpret_request(&self, state: &mut WorkflowState) -> Result<Value, PhaseError> {
        if state.change_request.trim().is_empty() {
            return Err(PhaseError::UpstreamInput("change request is empty".into()));
        }
        let interpretation = self
            .collaborators
            .interpreter
            .interpret(&state.change_request, &state.codebase_root)
            .await
            .map_err(collaborator_error)?;

        state.add_targets(&interpretation.target_paths);
        state.entities = interpretation.entities;
        if state.target_paths.is_empty() {
            return Err(PhaseError::UpstreamInput(
                "no target paths could be derived from the change request".into(),
            ));
        }
        Ok(json!({
            "target_paths": state.target_paths,
            "entities": state.entities,
        }))
    }

    async fn validate_structure(&self, state: &mut WorkflowState) -> Result<Value, PhaseError> {
        let Some(layout) = state.expected_layout.clone() else {
            return Err(PhaseError::UpstreamInput("no expected layout detected".into()));
        };
        let tree = match state.tree.take() {
            Some(tree) => tree,
            None => scan(&state.codebase_root, ScanOptions::for_layout(&layout)).await?,
        };

        let report = self.scorer.score(&layout, &tree);
        state.tree = Some(tree);
        let output = json!({
            "score": report.score,
            "violations": report.violations.len(),
            "plan_steps": report.plan.len(),
        });
        state.violations = report.violations;
        state.compliance_score = Some(report.score);
        state.refactor_plan = Some(report.plan);
        Ok(output)
    }

    async fn plan_refactor(&self, state: &mut WorkflowState, ctx: &AttemptContext) -> Result<Produced, PhaseError> {
        let plan = state.refactor_plan.clone().unwrap_or_default();
        if plan.is_empty() {
            tracing::info!("refactor plan is empty; nothing to restructure");
            return Ok(json!({ "applied": 0, "plan_steps": 0 }).into());
        }

        let policy = ScopePolicy::build(&state.codebase_root, &plan.touched_paths());
        let objective = format!(
            "Restructure the codebase before this change: {}\nRefactor plan:\n{}",
            state.change_request.trim(),
            plan.describe()
        );
        self.collaborators.tools.reset().await;
        let outcome = self.agent_loop(state, ctx, &policy, &objective).await?;

        Ok(Produced {
            output: json!({
                "applied": outcome.patches.len(),
                "plan_steps": plan.len(),
                "turns": outcome.turns,
            }),
            writes: outcome.patches,
        })
    }

    /// Write the restructuring patches; cancellation stops between patches
    async fn commit_refactor(
        &self,
        state: &mut WorkflowState,
        ctx: &AttemptContext,
        writes: Vec<Patch>,
    ) -> Result<(), PhaseError> {
        let written = state.patches.len();
        let mut result = Ok(());
        for patch in writes {
            if let Err(err) = self.checkpoint(ctx, None) {
                result = Err(err);
                break;
            }
            if let Err(err) = self.write_patch(&patch).await {
                result = Err(err);
                break;
            }
            state.record_applied(patch);
        }
        self.collaborators.tools.reset().await;
        if state.patches.len() > written {
            state.invalidate_tree();
        }
        result
    }

    async fn assess_impact(&self, state: &mut WorkflowState, ctx: &AttemptContext) -> Result<Value, PhaseError> {
        let policy = state.policy();
        let objective = state.change_request.trim().to_string();
        let outcome = self.agent_loop(state, ctx, &policy, &objective).await?;
        let added = state.add_targets(&outcome.proposed_targets);
        if added > 0 {
            tracing::info!(added, total = state.target_paths.len(), "scope widened by impact assessment");
        }
        Ok(json!({ "turns": outcome.turns, "targets_added": added }))
    }

    async fn produce_edits(&self, state: &mut WorkflowState, ctx: &AttemptContext) -> Result<Value, PhaseError> {
        self.collaborators.tools.reset().await;
        state.staged_patches.clear();
        state.applied_staged = 0;

        let policy = state.policy();
        let objective = state.change_request.trim().to_string();
        let outcome = self.agent_loop(state, ctx, &policy, &objective).await?;
        let staged = outcome.patches.len();
        state.staged_patches = outcome.patches;
        Ok(json!({ "turns": outcome.turns, "staged": staged }))
    }

    /// Write the staged patches; a retry resumes after the last written one
    async fn apply_edits(
        &self,
        state: &mut WorkflowState,
        ctx: &AttemptContext,
        deadline: Instant,
    ) -> Result<Value, PhaseError> {
        while let Some(patch) = state.pending_patches().first().cloned() {
            self.checkpoint(ctx, Some(deadline))?;
            self.write_patch(&patch).await?;
            state.applied_staged += 1;
            state.invalidate_tree();
            state.record_applied(patch);
        }
        self.checkpoint(ctx, None)?;
        Ok(json!({ "applied": state.applied_staged }))
    }

    async fn write_patch(&self, patch: &Patch) -> Result<(), PhaseError> {
        self.collaborators
            .tools
            .apply(patch)
            .await
            .map_err(|source| PhaseError::Io {
                path: patch.path.to_path_buf(),
                source,
            })
    }

    /// Drive the agent until it finishes, the turn budget runs out or the
    /// guardrail trips
    async fn agent_loop(
        &self,
        state: &WorkflowState,
        ctx: &AttemptContext,
        policy: &ScopePolicy,
        objective: &str,
    ) -> Result<AgentOutcome, PhaseError> {
        if policy.is_empty() {
            return Err(PhaseError::UpstreamInput(format!(
                "{} has an empty scope; no tool call could be allowed",
                ctx.phase
            )));
        }

        let summary = policy.summary();
        let root = policy.root().clone();
        let guardrail = &ctx.guardrail;
        let mut conversation = AgentTurnInput::default().with_message(TurnMessage::user(format!(
            "{}\n\nChange request: {}",
            instructions(ctx.phase),
            state.change_request.trim()
        )));
        let mut outcome = AgentOutcome::default();

        for turn in 0..self.config.max_turns {
            let input = self.injector.wrap(&conversation, objective, &summary);
            let reply = self
                .collaborators
                .backend
                .next_turn(AgentRequest {
                    phase: ctx.phase,
                    turn,
                    input,
                })
                .await
                .map_err(|e| PhaseError::Backend(e.to_string()))?;

            if !reply.message.is_empty() {
                conversation.push(TurnMessage::assistant(reply.message.clone()));
            }

            for call in &reply.tool_calls {
                let decision = guardrail.evaluate(&call.name, &call.arguments, policy);
                match &decision {
                    GuardrailDecision::Reject { reason } => {
                        conversation.push(TurnMessage::tool(format!("tool call rejected: {reason}")));
                        if guardrail.loop_detected() {
                            return Err(PhaseError::GuardrailLoop {
                                rejected: guardrail.rejected(),
                                threshold: guardrail.config().reject_threshold,
                            });
                        }
                        continue;
                    }
                    GuardrailDecision::Warn { reason, .. } => ctx.warn(reason.clone()),
                    GuardrailDecision::Allow { .. } => {}
                }

                let result = self
                    .collaborators
                    .tools
                    .execute(ToolRequest {
                        call,
                        kind: call.kind(),
                        target: decision.path(),
                        root: &root,
                    })
                    .await;
                tracing::debug!(tool = %call.name, success = result.success, "tool call executed");
                conversation.push(TurnMessage::tool(result.output));
                if let (true, Some(patch)) = (result.success, result.patch) {
                    outcome.patches.push(patch);
                }
            }

            for token in MentionScanner::tokens(&reply.message) {
                if !policy.is_allowed(token) {
                    ctx.warn(format!("agent mentioned out-of-scope path '{token}'"));
                }
            }
            outcome.proposed_targets.extend(reply.proposed_targets);

            if reply.is_final {
                outcome.turns = turn + 1;
                return Ok(outcome);
            }
        }

        Err(PhaseError::TurnBudgetExhausted {
            max_turns: self.config.max_turns,
        })
    }
}

fn instructions(phase: Phase) -> &'static str {
    match phase {
        Phase::PlanRefactor => {
            "Restructure the codebase according to the refactor plan. Create the planned \
             directories and files; do not change behaviour."
        }
        Phase::AssessImpact => {
            "Read the code the change touches and report which further files must change. \
             Propose any additional target paths in your final turn."
        }
        Phase::ProduceEdits => "Make the requested change. Write complete file contents.",
        _ => "",
    }
}

fn collaborator_error(err: CollaboratorError) -> PhaseError {
    match err {
        CollaboratorError::InvalidInput(msg) => PhaseError::UpstreamInput(msg),
        other => PhaseError::Collaborator(other.to_string()),
    }
}

async fn scan(root: &Path, options: ScanOptions) -> Result<DirectoryTree, PhaseError> {
    let owned = root.to_path_buf();
    tokio::task::spawn_blocking(move || DirectoryTree::scan(&owned, &options))
        .await
        .map_err(|e| PhaseError::Collaborator(format!("scan task failed: {e}")))?
        .map_err(|err| match err {
            ScanError::NotADirectory(path) => {
                PhaseError::UpstreamInput(format!("'{}' is not a directory", path.display()))
            }
            ScanError::Io { path, source } => PhaseError::Io { path, source },
        })
}
