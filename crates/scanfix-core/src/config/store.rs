//! Persistent key-value access to the settings the host edits at runtime.
//!
//! Setters write through to the TOML file immediately. The file is edited in
//! place with `toml_edit` so comments and unrelated keys are preserved.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::ConfigError;

use super::Config;

/// Getters and synchronously-persisting setters for host-editable settings.
pub trait ConfigStore: Send + Sync {
    /// Configured profile path, if any.
    fn profile_path(&self) -> Option<PathBuf>;

    /// Configured watch directory, if any.
    fn watch_dir(&self) -> Option<PathBuf>;

    /// Output subdirectory name.
    fn output_dir(&self) -> String;

    fn set_profile_path(&self, path: &Path) -> Result<(), ConfigError>;

    fn set_watch_dir(&self, dir: &Path) -> Result<(), ConfigError>;

    fn set_output_dir(&self, name: &str) -> Result<(), ConfigError>;
}

/// [`ConfigStore`] backed by a TOML file on disk.
pub struct FileConfigStore {
    path: PathBuf,
    config: RwLock<Config>,
}

impl FileConfigStore {
    /// Open the store at `path`, using defaults if the file doesn't exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            Config::load_from(&path)?
        } else {
            Config::default()
        };
        Ok(Self {
            path,
            config: RwLock::new(config),
        })
    }

    /// Open the store at the default config location.
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(Config::default_path())
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the full configuration.
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate, persist, then commit a change to the in-memory config.
    ///
    /// The in-memory value only changes once the file write has succeeded.
    fn update<F>(&self, section: &str, key: &str, value: &str, apply: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Config),
    {
        let mut candidate = self.config();
        apply(&mut candidate);
        candidate.validate()?;

        self.persist(section, key, value)?;

        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *config = candidate;
        tracing::debug!("Config {section}.{key} updated in {:?}", self.path);
        Ok(())
    }

    fn persist(&self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let content = if self.path.exists() {
            std::fs::read_to_string(&self.path)?
        } else {
            String::new()
        };
        let mut doc: toml_edit::DocumentMut = content
            .parse()
            .map_err(|e: toml_edit::TomlError| ConfigError::WriteError(e.to_string()))?;

        if !doc.contains_key(section) {
            doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
        }
        doc[section][key] = toml_edit::value(value);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&self.path, doc.to_string())
            .map_err(|e| ConfigError::WriteError(format!("{}: {e}", self.path.display())))
    }
}

impl ConfigStore for FileConfigStore {
    fn profile_path(&self) -> Option<PathBuf> {
        self.config().profile_path()
    }

    fn watch_dir(&self) -> Option<PathBuf> {
        self.config().watch_dir()
    }

    fn output_dir(&self) -> String {
        self.config().watch.output_dir
    }

    fn set_profile_path(&self, path: &Path) -> Result<(), ConfigError> {
        let value = path.to_string_lossy().into_owned();
        self.update("profile", "path", &value, |c| {
            c.profile.path = Some(path.to_path_buf())
        })
    }

    fn set_watch_dir(&self, dir: &Path) -> Result<(), ConfigError> {
        let value = dir.to_string_lossy().into_owned();
        self.update("watch", "dir", &value, |c| c.watch.dir = Some(dir.to_path_buf()))
    }

    fn set_output_dir(&self, name: &str) -> Result<(), ConfigError> {
        self.update("watch", "output_dir", name, |c| {
            c.watch.output_dir = name.to_string()
        })
    }
}
