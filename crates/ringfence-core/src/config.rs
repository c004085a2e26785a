//! Workflow configuration
//!
//! Loaded from TOML; every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! phase_timeout_secs = 300
//! max_retries = 2
//! max_turns = 25
//!
//! [phase_timeouts]
//! produce_edits = 900
//!
//! [guard]
//! reject_threshold = 10
//! read_only_mode = "soft"
//!
//! [scoring.weights]
//! critical = 25
//! high = 15
//! medium = 5
//! low = 1
//!
//! [clarification]
//! max_rounds = 1
//! min_score = 60
//! ```

use crate::phase::Phase;
use ringfence_guard::GuardrailConfig;
use ringfence_structure::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config '{path}': {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Cause
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Clarification loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarificationConfig {
    /// Refactor-planning rounds before the workflow proceeds anyway
    pub max_rounds: u32,
    /// Scores below this also route to refactor planning
    pub min_score: Option<u8>,
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 1,
            min_score: None,
        }
    }
}

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Wall-clock budget per phase attempt
    pub phase_timeout_secs: u64,
    /// Per-phase overrides, keyed by phase name
    pub phase_timeouts: BTreeMap<String, u64>,
    /// Extra attempts for transient failures
    pub max_retries: u32,
    /// Agent turns per phase attempt
    pub max_turns: usize,
    /// Guardrail settings
    pub guard: GuardrailConfig,
    /// Scorer settings
    pub scoring: ScoringConfig,
    /// Clarification loop settings
    pub clarification: ClarificationConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 300,
            phase_timeouts: BTreeMap::new(),
            max_retries: 2,
            max_turns: 25,
            guard: GuardrailConfig::default(),
            scoring: ScoringConfig::default(),
            clarification: ClarificationConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With default phase timeout
    #[inline]
    #[must_use]
    pub fn with_phase_timeout_secs(mut self, secs: u64) -> Self {
        self.phase_timeout_secs = secs;
        self
    }

    /// With a timeout for one phase
    #[must_use]
    pub fn with_phase_timeout(mut self, phase: Phase, secs: u64) -> Self {
        self.phase_timeouts.insert(phase.as_str().to_string(), secs);
        self
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// With turn budget
    #[inline]
    #[must_use]
    pub fn with_max_turns(mut self, turns: usize) -> Self {
        self.max_turns = turns;
        self
    }

    /// With guardrail settings
    #[inline]
    #[must_use]
    pub fn with_guard(mut self, guard: GuardrailConfig) -> Self {
        self.guard = guard;
        self
    }

    /// With scorer settings
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// With clarification settings
    #[inline]
    #[must_use]
    pub fn with_clarification(mut self, clarification: ClarificationConfig) -> Self {
        self.clarification = clarification;
        self
    }

    /// Timeout for a phase
    #[must_use]
    pub fn timeout_for(&self, phase: Phase) -> Duration {
        let secs = self
            .phase_timeouts
            .get(phase.as_str())
            .copied()
            .unwrap_or(self.phase_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Attempts allowed per phase
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML or invalid values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "workflow config loaded");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns error on zero timeouts, a zero turn budget or unknown phase names
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phase_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "phase_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for (name, secs) in &self.phase_timeouts {
            if Phase::from_name(name).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "phase_timeouts: unknown phase '{name}'"
                )));
            }
            if *secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "phase_timeouts.{name} must be greater than zero"
                )));
            }
        }
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid(
                "max_turns must be greater than zero".to_string(),
            ));
        }
        if self.clarification.min_score.is_some_and(|s| s > 100) {
            return Err(ConfigError::Invalid(
                "clarification.min_score must be at most 100".to_string(),
            ));
        }
        Ok(())
    }
}
