//! Per-session state.
//!
//! An explicit value created on session start, threaded through the
//! controller, and discarded on exit. It is never persisted.

use serde::{Deserialize, Serialize};

/// Phase of the turn state machine.
///
/// `Idle → AwaitingResponse → Streaming → Idle` per turn. At most one
/// assistant message may be in progress per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Waiting for user submission.
    #[default]
    Idle,
    /// A request is in flight; no fragment has arrived yet.
    AwaitingResponse,
    /// Fragments are being accumulated into the assistant message.
    Streaming,
}

/// Process-local state for one interactive session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Owner of the history file this session reads and writes.
    pub user_id: String,
    /// Model used for new turns.
    pub model: String,
    /// System instruction sent with every request.
    pub system_prompt: String,
    /// Extracted text from the most recent upload, consumed by the next turn.
    pub file_context: Option<String>,
    /// Index of the active transcript in the loaded history, if any.
    pub active: Option<usize>,
    /// Current phase of the turn state machine.
    pub phase: TurnPhase,
}

impl SessionContext {
    /// Creates session state for a fresh session.
    pub fn new(
        user_id: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            file_context: None,
            active: None,
            phase: TurnPhase::Idle,
        }
    }

    /// Takes the cached file context, leaving none behind.
    ///
    /// The cache is single-use: whatever was uploaded attaches to exactly
    /// one turn.
    pub fn take_file_context(&mut self) -> Option<String> {
        self.file_context.take()
    }

    /// Returns true while a stream is being consumed.
    pub fn is_streaming(&self) -> bool {
        self.phase != TurnPhase::Idle
    }
}
