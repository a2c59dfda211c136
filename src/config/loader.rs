use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::ShellConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl ShellConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/effect-shell/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("effect-shell").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `ShellConfig::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(ShellConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ShellConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Http timeouts are non-zero
    /// - The key-value page size is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "http.timeout_seconds must be greater than zero".to_string(),
            });
        }

        if self.http.connect_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "http.connect_timeout_seconds must be greater than zero".to_string(),
            });
        }

        if self.store.page_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "store.page_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
