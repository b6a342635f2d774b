//! Stable user identity.
//!
//! The history store keys files by user id. The id is a uuid minted on
//! first run and persisted beside the configuration, so history survives
//! restarts.

use std::fs;
use std::path::PathBuf;

use lochat_core::error::{ChatError, Result};

use crate::paths::ChatPaths;

/// Provides the stable user identifier for this installation.
pub struct UserService {
    id_file: PathBuf,
}

impl UserService {
    /// Creates a UserService over an explicit identifier file path.
    pub fn with_path(id_file: PathBuf) -> Self {
        Self { id_file }
    }

    /// Creates a UserService at the default location.
    pub fn new() -> Result<Self> {
        let id_file = ChatPaths::user_id_file()
            .map_err(|e| ChatError::config(format!("Failed to resolve user id path: {}", e)))?;
        Ok(Self::with_path(id_file))
    }

    /// Returns the user id, minting and persisting one on first run.
    pub fn user_id(&self) -> Result<String> {
        if self.id_file.exists() {
            let id = fs::read_to_string(&self.id_file)?;
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        if let Some(parent) = self.id_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.id_file, &id)?;
        Ok(id)
    }
}
