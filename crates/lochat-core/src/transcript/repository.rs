//! Repository seam for per-user transcript persistence.

use async_trait::async_trait;

use super::Transcript;
use crate::error::Result;

/// Persistence backend for a user's transcript list.
///
/// Implementations live in the infrastructure layer. `load` fails soft:
/// a missing, unreadable, or corrupt history file yields an empty list
/// rather than an error, so a damaged file can never block a session.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Returns the saved transcripts for `user_id`, oldest first.
    async fn load(&self, user_id: &str) -> Vec<Transcript>;

    /// Replaces the saved transcript list for `user_id`.
    ///
    /// The write must be atomic: a concurrent `load` sees either the prior
    /// content or the new content, never a partial file.
    async fn save(&self, user_id: &str, transcripts: &[Transcript]) -> Result<()>;
}
