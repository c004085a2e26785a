//! Tool-call guardrail
//!
//! Intercepts every tool call an agent makes and decides, against the
//! phase's [`ScopePolicy`], whether it may reach the file system.
//!
//! # Decision rules
//! - Mutating tools in a read-only phase are rejected.
//! - Mutating tools without a target path or without content are rejected.
//! - Mutating tools outside the scope are always rejected.
//! - Read-only tools outside the scope are rejected in hard mode and only
//!   warned about in soft mode.
//! - Unknown tools without a path pass; with a path they are held to the
//!   hard rule.
//!
//! Every rejection is counted. Once the count exceeds the configured
//! threshold the agent is considered stuck ([`ToolCallGuardrail::loop_detected`]).

use crate::extract::{extract_path, extract_payload};
use crate::tool::ToolKind;
use ringfence_scope::{ScopePath, ScopePolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// How out-of-scope read-only calls are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOnlyMode {
    /// Reject
    #[default]
    Hard,
    /// Allow with a warning
    Soft,
}

/// Whether a phase may change files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseAccess {
    /// Observation only
    ReadOnly,
    /// Observation and mutation
    #[default]
    ReadWrite,
}

/// Guardrail configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Rejections tolerated before the agent is considered stuck
    pub reject_threshold: usize,
    /// Treatment of out-of-scope read-only calls
    pub read_only_mode: ReadOnlyMode,
}

impl GuardrailConfig {
    /// With reject threshold
    #[inline]
    #[must_use]
    pub fn with_reject_threshold(mut self, threshold: usize) -> Self {
        self.reject_threshold = threshold;
        self
    }

    /// With read-only mode
    #[inline]
    #[must_use]
    pub fn with_read_only_mode(mut self, mode: ReadOnlyMode) -> Self {
        self.read_only_mode = mode;
        self
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            reject_threshold: 10,
            read_only_mode: ReadOnlyMode::Hard,
        }
    }
}

/// Why a tool call was rejected
///
/// The rendered message is fed back to the agent as the tool result, so it
/// names the offending path and what would have been accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Target path outside the allowed scope
    #[error("{tool} on '{path}' was rejected: the path is outside the allowed scope.\n{allowed}")]
    OutOfScope {
        /// Tool name
        tool: String,
        /// Path as the agent gave it
        path: String,
        /// Rendered allow-set
        allowed: String,
    },

    /// Mutating call without a target path
    #[error("{tool} was rejected: no target path found in its arguments (use a `path` argument)")]
    MissingTargetPath {
        /// Tool name
        tool: String,
    },

    /// Mutating call without content
    #[error("{tool} on '{path}' was rejected: no content found in its arguments")]
    MissingPayload {
        /// Tool name
        tool: String,
        /// Target path
        path: String,
    },

    /// Mutating call during a read-only phase
    #[error("{tool} was rejected: this phase is read-only, files cannot be changed yet")]
    ReadOnlyPhase {
        /// Tool name
        tool: String,
    },
}

impl RejectReason {
    /// Call reached for a path it may not touch
    #[inline]
    #[must_use]
    pub fn is_scope_violation(&self) -> bool {
        matches!(self, Self::OutOfScope { .. } | Self::ReadOnlyPhase { .. })
    }

    /// Call was malformed
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MissingTargetPath { .. } | Self::MissingPayload { .. })
    }
}

/// Outcome of evaluating one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardrailDecision {
    /// Call may proceed
    Allow {
        /// Canonical target path, when the call had one
        path: Option<ScopePath>,
    },
    /// Call may proceed but was out of scope
    Warn {
        /// Resolved target path
        path: Option<ScopePath>,
        /// Explanation surfaced to the agent and the report
        reason: String,
    },
    /// Call must not reach the file system
    Reject {
        /// Why
        reason: RejectReason,
    },
}

impl GuardrailDecision {
    /// Returns true if the call may proceed
    #[inline]
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        !self.is_reject()
    }

    /// Returns true if the decision is Reject
    #[inline]
    #[must_use]
    pub fn is_reject(&self) -> bool {
        matches!(self, GuardrailDecision::Reject { .. })
    }

    /// Returns true if the decision is Warn
    #[inline]
    #[must_use]
    pub fn is_warn(&self) -> bool {
        matches!(self, GuardrailDecision::Warn { .. })
    }

    /// Canonical path for permitted calls
    #[must_use]
    pub fn path(&self) -> Option<&ScopePath> {
        match self {
            GuardrailDecision::Allow { path } | GuardrailDecision::Warn { path, .. } => {
                path.as_ref()
            }
            GuardrailDecision::Reject { .. } => None,
        }
    }

    /// Returns a short type string for logging
    #[must_use]
    pub fn decision_type(&self) -> &'static str {
        match self {
            GuardrailDecision::Allow { .. } => "allow",
            GuardrailDecision::Warn { .. } => "warn",
            GuardrailDecision::Reject { .. } => "reject",
        }
    }
}

/// Decision counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailStats {
    /// Calls evaluated
    pub evaluated: usize,
    /// Calls allowed
    pub allowed: usize,
    /// Calls allowed with a warning
    pub warned: usize,
    /// Calls rejected
    pub rejected: usize,
}

/// Evaluates tool calls against a scope policy
///
/// Counters use interior mutability so one guardrail can be shared (behind
/// an `Arc`) between the agent loop and whoever supervises it.
#[derive(Debug, Default)]
pub struct ToolCallGuardrail {
    config: GuardrailConfig,
    access: PhaseAccess,
    evaluated: AtomicUsize,
    allowed: AtomicUsize,
    warned: AtomicUsize,
    rejected: AtomicUsize,
}

impl ToolCallGuardrail {
    /// Create guardrail with configuration
    #[must_use]
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// With phase access
    #[inline]
    #[must_use]
    pub fn with_access(mut self, access: PhaseAccess) -> Self {
        self.access = access;
        self
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Phase access in effect
    #[inline]
    #[must_use]
    pub fn access(&self) -> PhaseAccess {
        self.access
    }

    /// Evaluate one tool call
    pub fn evaluate(
        &self,
        tool_name: &str,
        arguments: &Value,
        policy: &ScopePolicy,
    ) -> GuardrailDecision {
        let kind = ToolKind::classify(tool_name);
        let decision = self.decide(tool_name, kind, arguments, policy);
        self.record(tool_name, kind, &decision);
        decision
    }

    fn decide(
        &self,
        tool_name: &str,
        kind: ToolKind,
        arguments: &Value,
        policy: &ScopePolicy,
    ) -> GuardrailDecision {
        let path = extract_path(arguments);

        if kind.is_mutating() {
            if self.access == PhaseAccess::ReadOnly {
                return reject(RejectReason::ReadOnlyPhase {
                    tool: tool_name.to_string(),
                });
            }
            let Some(path) = path else {
                return reject(RejectReason::MissingTargetPath {
                    tool: tool_name.to_string(),
                });
            };
            if extract_payload(arguments).is_none() {
                return reject(RejectReason::MissingPayload {
                    tool: tool_name.to_string(),
                    path,
                });
            }
            return match policy.admit(&path) {
                Some(admission) => GuardrailDecision::Allow {
                    path: Some(admission.path().clone()),
                },
                None => out_of_scope(tool_name, path, policy),
            };
        }

        let Some(path) = path else {
            return GuardrailDecision::Allow { path: None };
        };

        if let Some(admission) = policy.admit(&path) {
            return GuardrailDecision::Allow {
                path: Some(admission.path().clone()),
            };
        }
        if matches!(kind, ToolKind::List | ToolKind::Search) && policy.covers_directory(&path) {
            return GuardrailDecision::Allow {
                path: Some(policy.resolve(&path)),
            };
        }

        if kind.is_read_only() && self.config.read_only_mode == ReadOnlyMode::Soft {
            return GuardrailDecision::Warn {
                reason: format!("{tool_name} on '{path}' is outside the allowed scope"),
                path: Some(policy.resolve(&path)),
            };
        }
        out_of_scope(tool_name, path, policy)
    }

    fn record(&self, tool_name: &str, kind: ToolKind, decision: &GuardrailDecision) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        match decision {
            GuardrailDecision::Allow { path } => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(tool = tool_name, %kind, path = ?path, "tool call allowed");
            }
            GuardrailDecision::Warn { reason, .. } => {
                self.warned.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(tool = tool_name, %kind, %reason, "out-of-scope read allowed");
            }
            GuardrailDecision::Reject { reason } => {
                let total = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    tool = tool_name,
                    %kind,
                    rejected = total,
                    threshold = self.config.reject_threshold,
                    reason = %reason,
                    "tool call rejected"
                );
            }
        }
    }

    /// Rejections so far
    #[inline]
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters
    #[must_use]
    pub fn stats(&self) -> GuardrailStats {
        GuardrailStats {
            evaluated: self.evaluated.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            warned: self.warned.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Whether rejections exceeded the threshold
    #[inline]
    #[must_use]
    pub fn loop_detected(&self) -> bool {
        self.rejected() > self.config.reject_threshold
    }
}

fn reject(reason: RejectReason) -> GuardrailDecision {
    GuardrailDecision::Reject { reason }
}

fn out_of_scope(tool_name: &str, path: String, policy: &ScopePolicy) -> GuardrailDecision {
    reject(RejectReason::OutOfScope {
        tool: tool_name.to_string(),
        path,
        allowed: policy.summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> ScopePolicy {
        ScopePolicy::build("/repo", &["/repo/src/model/Order.java"])
    }

    fn guard() -> ToolCallGuardrail {
        ToolCallGuardrail::new(GuardrailConfig::default())
    }

    #[test]
    fn in_scope_write_is_allowed_with_canonical_path() {
        let decision = guard().evaluate(
            "Write",
            &json!({"file_path": "model/Order.java", "content": "class Order {}"}),
            &policy(),
        );
        assert_eq!(
            decision.path(),
            Some(&ScopePath::parse("/repo/src/model/Order.java"))
        );
    }

    #[test]
    fn out_of_scope_write_names_path_and_scope() {
        let decision = guard().evaluate(
            "Write",
            &json!({"path": "/repo/src/controller/Other.java", "content": "x"}),
            &policy(),
        );
        let GuardrailDecision::Reject { reason } = decision else {
            panic!("expected rejection");
        };
        let message = reason.to_string();
        assert!(message.contains("/repo/src/controller/Other.java"));
        assert!(message.contains("/repo/src/model/Order.java"));
        assert!(reason.is_scope_violation());
    }

    #[test]
    fn mutating_call_without_path_is_rejected() {
        let decision = guard().evaluate("Edit", &json!({"new_string": "x"}), &policy());
        assert!(matches!(
            decision,
            GuardrailDecision::Reject {
                reason: RejectReason::MissingTargetPath { .. }
            }
        ));
    }

    #[test]
    fn mutating_call_without_payload_is_rejected() {
        let decision = guard().evaluate(
            "Write",
            &json!({"path": "/repo/src/model/Order.java"}),
            &policy(),
        );
        let GuardrailDecision::Reject { reason } = decision else {
            panic!("expected rejection");
        };
        assert!(reason.is_malformed());
    }

    #[test]
    fn read_only_phase_rejects_mutation_in_scope() {
        let guard = guard().with_access(PhaseAccess::ReadOnly);
        let decision = guard.evaluate(
            "Write",
            &json!({"path": "/repo/src/model/Order.java", "content": "x"}),
            &policy(),
        );
        assert!(decision.is_reject());
        let read = guard.evaluate("Read", &json!({"path": "/repo/src/model/Order.java"}), &policy());
        assert!(read.is_permitted());
    }

    #[test]
    fn soft_mode_warns_on_out_of_scope_reads_only() {
        let guard = ToolCallGuardrail::new(
            GuardrailConfig::default().with_read_only_mode(ReadOnlyMode::Soft),
        );
        let read = guard.evaluate("Read", &json!({"path": "/repo/pom.xml"}), &policy());
        assert!(read.is_warn());
        let write = guard.evaluate(
            "Write",
            &json!({"path": "/repo/pom.xml", "content": "x"}),
            &policy(),
        );
        assert!(write.is_reject());
        assert_eq!(guard.stats().warned, 1);
        assert_eq!(guard.stats().rejected, 1);
    }

    #[test]
    fn listing_an_allowed_directory_is_permitted() {
        let decision = guard().evaluate("LS", &json!({"path": "/repo/src/model"}), &policy());
        assert!(decision.is_permitted());
        let outside = guard().evaluate("LS", &json!({"path": "/repo/src"}), &policy());
        assert!(outside.is_reject());
    }

    #[test]
    fn searching_an_allowed_directory_is_permitted() {
        let g = guard();
        let decision = g.evaluate(
            "Grep",
            &json!({"pattern": "class Order", "path": "/repo/src/model"}),
            &policy(),
        );
        assert_eq!(decision.path(), Some(&ScopePath::parse("/repo/src/model")));
        let outside = g.evaluate("Grep", &json!({"pattern": "x", "path": "/repo/src"}), &policy());
        assert!(outside.is_reject());
        let read = g.evaluate("Read", &json!({"path": "/repo/src/model"}), &policy());
        assert!(read.is_reject());
    }

    #[test]
    fn unknown_tools_without_path_pass() {
        let g = guard();
        assert!(g.evaluate("Bash", &json!({"command": "ls"}), &policy()).is_permitted());
        assert!(g
            .evaluate("Bash", &json!({"command": "rm", "path": "/etc"}), &policy())
            .is_reject());
    }

    #[test]
    fn loop_detected_only_after_threshold_is_exceeded() {
        let g = ToolCallGuardrail::new(GuardrailConfig::default().with_reject_threshold(2));
        let args = json!({"path": "/outside/a.rs", "content": "x"});
        g.evaluate("Write", &args, &policy());
        g.evaluate("Write", &args, &policy());
        assert!(!g.loop_detected());
        g.evaluate("Write", &args, &policy());
        assert!(g.loop_detected());
        assert_eq!(g.rejected(), 3);
    }
}
