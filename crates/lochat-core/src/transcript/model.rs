//! Transcript domain model.

use serde::{Deserialize, Serialize};

use super::{Message, MessageRole};

/// Maximum number of characters of the first user message used as a title.
const TITLE_MAX_CHARS: usize = 30;

/// One saved conversation for a user.
///
/// This is the "pure" model the controller operates on. It is independent
/// of any specific storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    /// Model name used for the most recently completed turn.
    pub model: String,
    pub messages: Vec<Message>,
}

impl Transcript {
    /// Creates an empty transcript with a generated identifier.
    pub fn new(model: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            created_at: now.clone(),
            updated_at: now,
            model: model.into(),
            messages: Vec::new(),
        }
    }

    /// Appends a finalized message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Stamps the transcript after a completed turn: refreshes the title
    /// from the first user message when unset, records the model used, and
    /// bumps `updated_at`.
    pub fn touch(&mut self, model: &str) {
        if self.title.is_empty() {
            self.title = self.derive_title();
        }
        self.model = model.to_string();
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Title from the first user message, truncated to 30 characters.
    fn derive_title(&self) -> String {
        let first_user = self
            .messages
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("Chat");

        if first_user.chars().count() > TITLE_MAX_CHARS {
            let truncated: String = first_user.chars().take(TITLE_MAX_CHARS).collect();
            format!("{}...", truncated)
        } else {
            first_user.to_string()
        }
    }

    /// Number of completed exchanges (user + assistant pairs).
    pub fn exchange_count(&self) -> usize {
        self.messages.len() / 2
    }
}
