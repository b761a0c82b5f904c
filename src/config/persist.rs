// Configuration persistence module
// Writes the configuration file back after access-control changes

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use super::types::Config;
use crate::security::{SecurityPersistence, SecuritySnapshot};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write configuration file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Owner of the on-disk configuration file.
///
/// Keeps the last written configuration in memory and re-serializes the whole
/// file when the security section changes, so the file stays authoritative
/// across restarts without being re-parsed after each write.
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<Config>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config: Mutex::new(config),
        }
    }

    /// Write the current configuration to disk
    pub fn save(&self) -> Result<(), PersistError> {
        let config = self
            .config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        write_config(&self.path, &config)
    }

    /// Write the configuration file only if it does not exist yet
    pub fn save_if_missing(&self) -> Result<bool, PersistError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Copy of the configuration as last persisted
    pub fn current(&self) -> Config {
        self.config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecurityPersistence for ConfigStore {
    fn persist(&self, snapshot: &SecuritySnapshot) -> Result<(), PersistError> {
        let mut config = self
            .config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        config.security = snapshot.to_settings();
        write_config(&self.path, &config)
    }
}

fn write_config(path: &Path, config: &Config) -> Result<(), PersistError> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    // Write beside the target and rename so readers never see a torn file
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
