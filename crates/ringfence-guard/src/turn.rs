//! Agent turn input model

use serde::{Deserialize, Serialize};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions from the workflow
    System,
    /// The change request or operator input
    User,
    /// The agent itself
    Assistant,
    /// Result of a tool call
    Tool,
}

/// One message of the conversation handed to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
}

impl TurnMessage {
    /// Create message
    #[inline]
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// System message
    #[inline]
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// User message
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant message
    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Tool result message
    #[inline]
    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// Everything the agent sees on one turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTurnInput {
    /// Conversation so far, oldest first
    pub messages: Vec<TurnMessage>,
}

impl AgentTurnInput {
    /// Create from messages
    #[inline]
    #[must_use]
    pub fn new(messages: Vec<TurnMessage>) -> Self {
        Self { messages }
    }

    /// Append a message
    #[inline]
    pub fn push(&mut self, message: TurnMessage) {
        self.messages.push(message);
    }

    /// With an appended message
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: TurnMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Number of messages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
