//! Tool-call model
//!
//! Agents name their tools freely (`Write`, `write_file`, `str_replace`...).
//! [`ToolKind::classify`] folds those names onto the handful of operations the
//! workflow understands.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Operation a tool performs on the file system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// List a directory
    List,
    /// Read a file
    Read,
    /// Search file contents or names
    Search,
    /// Create (or overwrite) a file
    Create,
    /// Modify an existing file
    Edit,
    /// Anything else
    Other,
}

impl ToolKind {
    /// Classify a tool by name
    #[must_use]
    pub fn classify(tool_name: &str) -> Self {
        let normalized: String = tool_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "ls" | "list" | "listdir" | "listdirectory" | "listfiles" | "glob" | "readdir" => {
                ToolKind::List
            }
            "read" | "readfile" | "cat" | "view" | "open" | "openfile" | "viewfile" => {
                ToolKind::Read
            }
            "grep" | "search" | "find" | "searchfiles" | "findfiles" | "codebasesearch"
            | "ripgrep" | "rg" => ToolKind::Search,
            "write" | "writefile" | "create" | "createfile" | "newfile" | "savefile" => {
                ToolKind::Create
            }
            "edit" | "editfile" | "multiedit" | "strreplace" | "replace" | "patch"
            | "applypatch" | "notebookedit" | "modifyfile" | "updatefile" => ToolKind::Edit,
            _ => ToolKind::Other,
        }
    }

    /// Whether the tool changes the file system
    #[inline]
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(self, ToolKind::Create | ToolKind::Edit)
    }

    /// Whether the tool only observes the file system
    #[inline]
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, ToolKind::List | ToolKind::Read | ToolKind::Search)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::List => write!(f, "list"),
            ToolKind::Read => write!(f, "read"),
            ToolKind::Search => write!(f, "search"),
            ToolKind::Create => write!(f, "create"),
            ToolKind::Edit => write!(f, "edit"),
            ToolKind::Other => write!(f, "other"),
        }
    }
}

/// Tool invocation requested by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id assigned by the agent framework
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name as the agent spelled it
    pub name: String,
    /// Raw arguments, in whatever shape the agent produced
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    /// Create a tool call
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    /// Attach a correlation id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Classified kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        ToolKind::classify(&self.name)
    }
}
