//! Conversation message types.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System instruction.
    System,
}

/// A single message in a conversation.
///
/// Messages are immutable once finalized; the only mutation path is the
/// in-progress assistant message the controller accumulates during
/// streaming, which only becomes a `Message` at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format).
    pub timestamp: String,
    /// Text extracted from an uploaded document, attached to this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_context: Option<String>,
    /// Failure annotation set when the turn ended in an adapter error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    /// Creates a user message, optionally carrying extracted file text.
    pub fn user(content: impl Into<String>, file_context: Option<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            file_context,
            error: None,
        }
    }

    /// Creates a finalized assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            file_context: None,
            error: None,
        }
    }

    /// Marks this message as the result of a failed turn.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if this message carries a failure annotation.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
