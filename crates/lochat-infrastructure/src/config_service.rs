//! Configuration service implementation.
//!
//! Loads the application configuration from the configuration file
//! (~/.config/lochat/config.toml), creating it with defaults on first run.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use lochat_core::config::AppConfig;
use lochat_core::error::{ChatError, Result};

use crate::paths::ChatPaths;

/// Configuration service that loads and caches the application configuration.
///
/// The configuration is read once and cached to avoid repeated file I/O.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Cached configuration loaded from file.
    /// Uses RwLock for thread-safe lazy loading.
    config: Arc<RwLock<Option<AppConfig>>>,
    config_path: PathBuf,
}

impl ConfigService {
    /// Creates a ConfigService over the default config file location.
    pub fn new() -> Result<Self> {
        let config_path = ChatPaths::config_file()
            .map_err(|e| ChatError::config(format!("Failed to resolve config path: {}", e)))?;
        Ok(Self::with_path(config_path))
    }

    /// Creates a ConfigService over an explicit config file path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
            config_path,
        }
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// A missing file is created with defaults; an unparseable file is
    /// reported at `warn` and replaced by defaults in memory.
    pub fn get_config(&self) -> AppConfig {
        {
            let read_lock = self.config.read().unwrap();
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = self.load_config().unwrap_or_else(|e| {
            tracing::warn!("Falling back to default configuration: {}", e);
            AppConfig::default()
        });

        {
            let mut write_lock = self.config.write().unwrap();
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap();
        *write_lock = None;
    }

    fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            let default_config = AppConfig::default();
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.config_path, toml::to_string_pretty(&default_config)?)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)?;
        Ok(toml::from_str(&content)?)
    }
}
