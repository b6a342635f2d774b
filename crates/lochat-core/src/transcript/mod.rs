//! Transcript domain module.
//!
//! A transcript is one saved conversation: an ordered list of messages
//! exchanged between the user and the model, plus the metadata needed to
//! show it in a history listing.
//!
//! - `model`: the `Transcript` entity
//! - `message`: `Message` and `MessageRole`
//! - `repository`: persistence seam for per-user transcript lists

mod message;
mod model;
mod repository;

pub use message::{Message, MessageRole};
pub use model::Transcript;
pub use repository::HistoryRepository;
