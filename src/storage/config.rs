//! Configuration handling for epub-checker
//!
//! Configuration is stored in `config.toml` under the platform config
//! directory (e.g. `~/.config/epub-checker/config.toml`). Every key is
//! optional; command-line flags override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Validator discovery and reporting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit validator jar or executable, bypassing discovery
    pub epubcheck: Option<PathBuf>,

    /// Explicit Java runtime for jar installations
    pub java: Option<PathBuf>,

    /// Extra candidate patterns probed before the built-in locations
    pub search_paths: Vec<String>,

    /// Upper bound for a validation run, in seconds
    pub timeout_secs: u64,

    /// Upper bound for each version probe, in seconds
    pub probe_timeout_secs: u64,

    /// Warnings printed in detail before the rest are elided
    pub max_warnings: usize,

    /// Locations printed per message
    pub max_locations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epubcheck: None,
            java: None,
            search_paths: Vec::new(),
            timeout_secs: 300,
            probe_timeout_secs: 10,
            max_warnings: 10,
            max_locations: 3,
        }
    }
}

impl Config {
    /// Loads configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse config")?;

        config.validate()?;
        Ok(config)
    }

    /// Returns the config directory
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "epubcheck", "epub-checker")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Rejects values that would make every run fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
