//! ringfence core
//!
//! Runs a tool-using code-modification agent through a fixed sequence of
//! phases, keeping every file it touches inside a scope derived from the
//! change request.
//!
//! # Core Concepts
//!
//! - [`PhaseOrchestrator`]: Phase state machine with retries, timeouts and cancellation
//! - [`WorkflowState`]: Everything one run knows; target paths drive the scope
//! - [`Collaborators`]: Detector, interpreter, agent backend and file tools
//! - [`WorkspaceTools`]: File tools that stage writes until the apply phase
//! - [`WorkflowReport`]: Status, patches, structure findings and the reason chain
//!
//! # Example
//!
//! ```rust,ignore
//! use ringfence_core::{Collaborators, PhaseOrchestrator, ReplayBackend, WorkflowConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = ReplayBackend::load("transcript.json")?;
//! let orchestrator = PhaseOrchestrator::new(
//!     WorkflowConfig::new().with_max_retries(1),
//!     Collaborators::new(Arc::new(backend)),
//! )?;
//!
//! let report = orchestrator
//!     .run("./service", "Add an OrderDto next to src/model/Order.java", CancellationToken::new())
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod patch;
pub mod phase;
pub mod report;
pub mod state;
pub mod tools;

pub use backend::{
    AgentBackend, AgentRequest, AgentTurn, CollaboratorError, Detection, Interpretation,
    PlatformDetector, ReplayBackend, RequestInterpreter, ToolExecutor, ToolOutcome, ToolRequest,
    Transcript,
};
pub use collaborators::{MarkerFileDetector, MentionInterpreter};
pub use config::{ClarificationConfig, ConfigError, WorkflowConfig};
pub use error::{FailureReason, PhaseError, WorkflowError};
pub use orchestrator::{route_after_validation, Collaborators, PhaseOrchestrator};
pub use patch::{Patch, PatchOperation};
pub use phase::{
    allowed_transitions, validate_transition, Phase, PhaseCursor, PhaseResult, PhaseStatus,
    TransitionError,
};
pub use report::{WorkflowReport, WorkflowStatus};
pub use state::WorkflowState;
pub use tools::WorkspaceTools;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running workflows
    pub use crate::{
        AgentBackend, AgentTurn, Collaborators, Phase, PhaseOrchestrator, ReplayBackend,
        WorkflowConfig, WorkflowReport, WorkflowStatus, WorkspaceTools,
    };
    pub use tokio_util::sync::CancellationToken;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
