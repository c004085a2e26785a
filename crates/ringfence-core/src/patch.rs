//! Patches
//!
//! A [`Patch`] is created only from an allowed, successfully executed
//! mutating tool call and never changes afterwards. Its payload is the full
//! resulting file content, so applying a sequence of patches in order is
//! enough to reproduce the staged state.

use ringfence_scope::ScopePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOperation {
    /// New file (or full overwrite)
    Create,
    /// Change to an existing file
    Edit,
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOperation::Create => write!(f, "create"),
            PatchOperation::Edit => write!(f, "edit"),
        }
    }
}

/// One staged or applied file change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Kind of change
    pub operation: PatchOperation,
    /// Absolute target path
    pub path: ScopePath,
    /// Full file content after the change
    pub payload: String,
}

impl Patch {
    /// Create patch
    #[must_use]
    pub fn new(operation: PatchOperation, path: ScopePath, payload: impl Into<String>) -> Self {
        Self {
            operation,
            path,
            payload: payload.into(),
        }
    }

    /// Write the payload to disk, creating parent directories
    ///
    /// # Errors
    /// Returns error if a directory or the file cannot be written
    pub async fn write(&self) -> std::io::Result<()> {
        let target = self.path.to_path_buf();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, self.payload.as_bytes()).await
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} bytes)", self.operation, self.path, self.payload.len())
    }
}
