use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted settings for the command-line front end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncNestConfig {
    pub source_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub exclude: Vec<String>,
}

impl SyncNestConfig {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load config from `path`, falling back to defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::Configuration {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        serde_yaml::from_str(&content).map_err(|e| Error::Configuration {
            reason: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Configuration {
                reason: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).map_err(|e| Error::Configuration {
            reason: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| Error::Configuration {
            reason: "Could not determine config directory".to_string(),
        })?;

        Ok(config_dir.join("syncnest").join("config.yaml"))
    }

    /// Validate config settings
    pub fn validate(&self) -> Result<()> {
        if let (Some(source), Some(backup)) = (&self.source_dir, &self.backup_dir) {
            if source == backup {
                return Err(Error::Configuration {
                    reason: format!(
                        "Source and backup directories are the same: {}",
                        source.display()
                    ),
                });
            }
        }

        if self.exclude.iter().any(|pattern| pattern.trim().is_empty()) {
            return Err(Error::Configuration {
                reason: "Exclude patterns must not be empty".to_string(),
            });
        }

        if self.exclude.iter().any(|pattern| pattern == "*") {
            warn!("Exclude pattern '*' skips every entry");
        }

        Ok(())
    }
}
