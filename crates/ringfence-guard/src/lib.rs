//! ringfence guard
//!
//! Keeps a tool-using agent inside its scope.
//!
//! # Core Concepts
//!
//! - [`ToolCall`] / [`ToolKind`]: What the agent asked for, and what kind of operation it is
//! - [`extract`]: Prioritised lookup of target paths and payloads in loosely shaped arguments
//! - [`ToolCallGuardrail`]: Allow / warn / reject decisions against a [`ScopePolicy`](ringfence_scope::ScopePolicy)
//! - [`IntentReminderInjector`]: Restates the objective and scope before every turn
//!
//! # Example
//!
//! ```rust
//! use ringfence_guard::{GuardrailConfig, ToolCallGuardrail};
//! use ringfence_scope::ScopePolicy;
//! use serde_json::json;
//!
//! let policy = ScopePolicy::build("/repo", &["/repo/src/model/Order.java"]);
//! let guard = ToolCallGuardrail::new(GuardrailConfig::default());
//!
//! let decision = guard.evaluate(
//!     "Write",
//!     &json!({"file_path": "/repo/src/controller/Other.java", "content": "..."}),
//!     &policy,
//! );
//! assert!(decision.is_reject());
//! ```

pub mod extract;
pub mod guardrail;
pub mod reminder;
pub mod tool;
pub mod turn;

pub use extract::{extract_path, extract_payload};
pub use guardrail::{
    GuardrailConfig, GuardrailDecision, GuardrailStats, PhaseAccess, ReadOnlyMode, RejectReason,
    ToolCallGuardrail,
};
pub use reminder::{IntentReminderInjector, REMINDER_BEGIN, REMINDER_END};
pub use tool::{ToolCall, ToolKind};
pub use turn::{AgentTurnInput, Role, TurnMessage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
