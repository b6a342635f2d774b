//! Unified path management for lochat files.
//!
//! This ensures consistency across all platforms (Linux, macOS, Windows).

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for lochat.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/lochat/            # Config directory
/// ├── config.toml              # Application configuration
/// └── user_id                  # Stable user identifier
///
/// ~/.local/share/lochat/       # Data directory
/// └── history/                 # Per-user transcript files
///     └── <user_id>.json
/// ```
pub struct ChatPaths;

impl ChatPaths {
    /// Returns the lochat configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/lochat/`)
    /// - `Err(PathError::HomeDirNotFound)`: Could not determine directory
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("lochat"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the lochat data directory.
    ///
    /// This is where larger files (transcript history) live.
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join("lochat"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the stable user identifier file.
    pub fn user_id_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("user_id"))
    }

    /// Returns the path to the history directory.
    pub fn history_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("history"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let config_dir = ChatPaths::config_dir().unwrap();
        assert!(config_dir.ends_with("lochat"));
    }

    #[test]
    fn test_config_file() {
        let config_file = ChatPaths::config_file().unwrap();
        assert!(config_file.ends_with("config.toml"));
        let config_dir = ChatPaths::config_dir().unwrap();
        assert!(config_file.starts_with(&config_dir));
    }

    #[test]
    fn test_user_id_file() {
        let user_id_file = ChatPaths::user_id_file().unwrap();
        assert!(user_id_file.ends_with("user_id"));
        let config_dir = ChatPaths::config_dir().unwrap();
        assert!(user_id_file.starts_with(&config_dir));
    }

    #[test]
    fn test_history_dir() {
        let history_dir = ChatPaths::history_dir().unwrap();
        assert!(history_dir.ends_with("history"));
        let data_dir = ChatPaths::data_dir().unwrap();
        assert!(history_dir.starts_with(&data_dir));
    }
}
