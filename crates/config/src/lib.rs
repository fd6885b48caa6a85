#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for the raw disk-image importer
//!
//! Loads and merges configuration from:
//! - Default values (hard-coded)
//! - Configuration file (`~/.config/rawpull/config.toml`)
//! - Environment variables

pub mod constants;
pub mod core;

pub use constants as fixed;
pub use core::{ImportConfig, NetworkConfig, PathConfig};

use rawpull_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let home_dir = dirs::home_dir().ok_or_else(|| ConfigError::NotFound {
            path: "home directory".to_string(),
        })?;
        Ok(home_dir.join(".config").join("rawpull").join("config.toml"))
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let mut config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.clamp_to_invariants();
        Ok(config)
    }

    /// Load configuration with fallback to defaults.
    ///
    /// If the config file doesn't exist, the default configuration is
    /// returned without touching disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;
        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an optional path, falling back to [`Config::load`] when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub async fn load_or_default(path: &Option<PathBuf>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge values from environment variables. CLI flags are expected to be
    /// applied on top of this by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparsable value.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(root) = std::env::var("RAWPULL_IMAGE_ROOT") {
            self.paths.image_root = PathBuf::from(root);
        }

        if let Ok(max_size) = std::env::var("RAWPULL_MAX_SIZE") {
            self.import.raw_max_size = max_size.parse().map_err(|_| ConfigError::InvalidValue {
                field: "RAWPULL_MAX_SIZE".to_string(),
                value: max_size,
            })?;
        }

        if let Ok(timeout) = std::env::var("RAWPULL_TIMEOUT_SECS") {
            self.network.timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: "RAWPULL_TIMEOUT_SECS".to_string(),
                value: timeout,
            })?;
        }

        self.clamp_to_invariants();
        Ok(())
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written.
    pub async fn save(&self) -> Result<(), Error> {
        let config_path = Self::default_path()?;
        self.save_to(&config_path).await
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written.
    pub async fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
                error: e.to_string(),
            })?;

        let content = format!(
            "# rawpull configuration file\n\
             # Automatically generated; edit freely.\n\n\
             {toml_string}"
        );

        fs::write(path, content)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;

        Ok(())
    }

    /// Clamp user-supplied values back within the hard invariants that the
    /// import core relies on (notably the size cap ceiling).
    fn clamp_to_invariants(&mut self) {
        self.import.raw_max_size = self.import.raw_max_size.min(constants::RAW_MAX_SIZE);
        if !self.import.sparse_alignment.is_power_of_two() {
            self.import.sparse_alignment = core::ImportConfig::default().sparse_alignment;
        }
    }
}
