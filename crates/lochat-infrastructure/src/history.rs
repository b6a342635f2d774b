//! JSON-file-backed history repository.
//!
//! One file per user under the history directory:
//!
//! ```text
//! history_dir/
//! ├── <user-id-1>.json
//! └── <user-id-2>.json
//! ```
//!
//! Each file holds the user's full transcript list. Saves replace the whole
//! file atomically; loads fail soft so a damaged file can never block a
//! session.

use async_trait::async_trait;
use lochat_core::error::{ChatError, Result};
use lochat_core::transcript::{HistoryRepository, Transcript};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::ChatPaths;
use crate::storage::AtomicJsonFile;

/// Filesystem-backed implementation of [`HistoryRepository`].
pub struct JsonHistoryRepository {
    history_dir: PathBuf,
}

impl JsonHistoryRepository {
    /// Creates a repository over the given history directory.
    ///
    /// The directory is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(history_dir: impl AsRef<Path>) -> Result<Self> {
        let history_dir = history_dir.as_ref().to_path_buf();
        fs::create_dir_all(&history_dir)
            .map_err(|e| ChatError::io(format!("Failed to create history directory: {}", e)))?;

        Ok(Self { history_dir })
    }

    /// Creates a repository at the platform-default location.
    pub fn default_location() -> Result<Self> {
        let history_dir = ChatPaths::history_dir()
            .map_err(|e| ChatError::config(format!("Failed to resolve history directory: {}", e)))?;
        Self::new(history_dir)
    }

    fn history_file(&self, user_id: &str) -> AtomicJsonFile<Vec<Transcript>> {
        AtomicJsonFile::new(self.history_dir.join(format!("{}.json", user_id)))
    }
}

#[async_trait]
impl HistoryRepository for JsonHistoryRepository {
    async fn load(&self, user_id: &str) -> Vec<Transcript> {
        match self.history_file(user_id).load() {
            Ok(Some(transcripts)) => transcripts,
            Ok(None) => Vec::new(),
            Err(e) => {
                // Corrupt history is recoverable: start from an empty list
                // rather than refusing to chat.
                tracing::warn!("Unreadable history file for user {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    async fn save(&self, user_id: &str, transcripts: &[Transcript]) -> Result<()> {
        self.history_file(user_id)
            .save(&transcripts.to_vec())
            .map_err(|e| ChatError::data_access(format!("Failed to save history: {}", e)))
    }
}
