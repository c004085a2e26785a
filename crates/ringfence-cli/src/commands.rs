//! Subcommand implementations

use crate::ReadMode;
use anyhow::Context;
use ringfence_core::{
    Collaborators, MarkerFileDetector, PhaseOrchestrator, PlatformDetector, ReplayBackend,
    WorkflowConfig,
};
use ringfence_guard::{GuardrailDecision, PhaseAccess, ReadOnlyMode, ToolCallGuardrail};
use ringfence_scope::ScopePolicy;
use ringfence_structure::{
    ComplianceReport, DirectoryTree, ExpectedLayout, ScanOptions, StructureComplianceScorer,
};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `score` output
#[derive(Debug, Serialize)]
pub struct ScoreOutput {
    /// Platform scored against
    pub platform: String,
    /// Files scanned
    pub files: usize,
    /// Scorer result
    #[serde(flatten)]
    pub report: ComplianceReport,
}

/// `check` arguments
#[derive(Debug, Clone)]
pub struct CheckArgs {
    /// Tool name
    pub tool: String,
    /// Raw JSON arguments
    pub arguments: String,
    /// Target paths the scope is built from
    pub targets: Vec<String>,
    /// Evaluate as a read-only phase
    pub read_only: bool,
    /// Out-of-scope read treatment
    pub reads: ReadMode,
}

/// `check` output
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    /// Rendered allow-set
    pub scope: String,
    /// Guardrail decision
    #[serde(flatten)]
    pub decision: GuardrailDecision,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WorkflowConfig> {
    match path {
        Some(path) => WorkflowConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(WorkflowConfig::default()),
    }
}

fn emit(out: &mut impl Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Scan `root` and score it
///
/// Succeeds when no violation is critical.
///
/// # Errors
/// Returns error on an unknown platform, a root without build markers when
/// no platform is given, or a failed scan
pub async fn score(
    root: &Path,
    platform: Option<&str>,
    config: Option<&Path>,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let config = load_config(config)?;
    let layout = match platform {
        Some(name) => ExpectedLayout::builtin(name).with_context(|| {
            format!(
                "unknown platform '{name}' (known: {})",
                ExpectedLayout::builtin_platforms().join(", ")
            )
        })?,
        None => {
            MarkerFileDetector::new()
                .detect(root)
                .await
                .context("detecting platform")?
                .layout
        }
    };

    let options = ScanOptions::for_layout(&layout);
    let scan_root = root.to_path_buf();
    let tree = tokio::task::spawn_blocking(move || DirectoryTree::scan(scan_root, &options))
        .await?
        .with_context(|| format!("scanning {}", root.display()))?;

    let report = StructureComplianceScorer::new(config.scoring).score(&layout, &tree);
    tracing::info!(
        platform = %layout.platform,
        score = report.score,
        violations = report.violations.len(),
        "codebase scored"
    );

    let passed = !report.has_critical();
    emit(
        out,
        &ScoreOutput {
            platform: layout.platform.clone(),
            files: tree.file_count(),
            report,
        },
    )?;
    Ok(passed)
}

/// Evaluate one tool call
///
/// Succeeds when the call is permitted.
///
/// # Errors
/// Returns error if the arguments are not a JSON object
pub fn check(root: &Path, args: &CheckArgs, out: &mut impl Write) -> anyhow::Result<bool> {
    let arguments: Value =
        serde_json::from_str(&args.arguments).context("tool arguments are not valid JSON")?;
    anyhow::ensure!(arguments.is_object(), "tool arguments must be a JSON object");

    let policy = ScopePolicy::build(root, &args.targets);
    let mode = match args.reads {
        ReadMode::Hard => ReadOnlyMode::Hard,
        ReadMode::Soft => ReadOnlyMode::Soft,
    };
    let access = if args.read_only {
        PhaseAccess::ReadOnly
    } else {
        PhaseAccess::ReadWrite
    };
    let guardrail = ToolCallGuardrail::new(WorkflowConfig::default().guard.with_read_only_mode(mode))
        .with_access(access);

    let decision = guardrail.evaluate(&args.tool, &arguments, &policy);
    let permitted = decision.is_permitted();
    emit(
        out,
        &CheckOutput {
            scope: policy.summary(),
            decision,
        },
    )?;
    Ok(permitted)
}

/// Run the workflow against a replayed transcript
///
/// Ctrl-C cancels the run; the partial report is still printed. Succeeds
/// when the workflow status is success.
///
/// # Errors
/// Returns error on an unreadable transcript or config, or a missing root
pub async fn run(
    root: &Path,
    request: &str,
    transcript: &Path,
    config: Option<&Path>,
    summary: bool,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let config = load_config(config)?;
    let backend = ReplayBackend::load(transcript)
        .with_context(|| format!("loading transcript from {}", transcript.display()))?;
    let orchestrator = PhaseOrchestrator::new(config, Collaborators::new(Arc::new(backend)))?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling workflow");
                cancel.cancel();
            }
        })
    };
    let report = orchestrator.run(root, request, cancel).await;
    interrupt.abort();
    let report = report?;

    if summary {
        writeln!(out, "{}", report.summary())?;
    } else {
        emit(out, &report)?;
    }
    Ok(report.is_success())
}
