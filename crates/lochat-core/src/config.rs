use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".to_string()
}

fn default_fragment_timeout_secs() -> u64 {
    120
}

/// Application configuration, loaded from `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the model-serving endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used when none is selected explicitly.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Initial system instruction for new sessions.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Overrides the platform-default history directory.
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
    /// Bounded wait for each streamed fragment before the turn fails.
    #[serde(default = "default_fragment_timeout_secs")]
    pub fragment_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_model: default_model(),
            system_prompt: default_system_prompt(),
            history_dir: None,
            fragment_timeout_secs: default_fragment_timeout_secs(),
        }
    }
}
