//! Model client adapter.
//!
//! Wraps the external model-serving endpoint behind the [`ModelClient`]
//! trait: list available models, and stream a chat completion as a finite
//! sequence of text fragments.

pub mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use tokio::sync::mpsc;

use lochat_core::error::{ChatError, Result};
use lochat_core::transcript::Message;

/// One element of a streamed model response.
///
/// A stream yields zero or more `Content` fragments followed by exactly one
/// terminal event: `Done` on normal completion, `Error` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental piece of the assistant response.
    Content(String),
    /// The remote model signaled completion.
    Done,
    /// The stream ended in a failure.
    Error(ChatError),
}

/// Everything the adapter needs to run one turn.
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    /// Model identifier to run.
    pub model: String,
    /// System instruction; skipped when empty.
    pub system_prompt: String,
    /// Prior messages plus the new user message, oldest first.
    pub messages: Vec<Message>,
}

impl ChatTurnRequest {
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            messages,
        }
    }
}

/// Adapter over a model-serving endpoint.
///
/// The returned receiver is consumed exactly once; dropping it cancels the
/// in-flight request.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Queries the endpoint for the available model identifiers.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Submits a turn and returns the fragment stream.
    async fn chat_stream(&self, request: ChatTurnRequest) -> mpsc::Receiver<StreamEvent>;
}
