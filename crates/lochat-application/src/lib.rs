//! Conversation orchestration.
//!
//! The controller ties the domain model, the history store, the file-text
//! extractor, and the model client together into the per-turn state
//! machine the UI drives.

pub mod controller;
pub mod markdown;

pub use controller::{ConversationController, TurnProgress};
