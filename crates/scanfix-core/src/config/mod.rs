//! Configuration management for scanfix.
//!
//! Configuration is loaded from a TOML file in the platform config directory
//! with sensible defaults. All config structs implement `Default`.

mod store;
mod types;
mod validate;

pub use store::{ConfigStore, FileConfigStore};
pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for scanfix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transform parameter settings
    pub profile: ProfileConfig,

    /// Watch-mode settings
    pub watch: WatchConfig,

    /// Processing settings
    pub processing: ProcessingConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.scanfix.scanfix/config.toml
    /// - Linux: ~/.config/scanfix/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\scanfix\config\config.toml
    ///
    /// Falls back to ~/.scanfix/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "scanfix", "scanfix")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".scanfix").join("config.toml")
            })
    }

    /// Resolved profile path (with ~ expansion).
    pub fn profile_path(&self) -> Option<PathBuf> {
        self.profile.path.as_deref().map(expand_tilde)
    }

    /// Resolved watch directory (with ~ expansion).
    pub fn watch_dir(&self) -> Option<PathBuf> {
        self.watch.dir.as_deref().map(expand_tilde)
    }

    /// Full path of the output directory for the configured watch directory.
    pub fn full_output_dir(&self) -> Option<PathBuf> {
        self.watch_dir().map(|dir| dir.join(&self.watch.output_dir))
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Expand a leading `~` in a path.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}
