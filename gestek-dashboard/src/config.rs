//! Configuration loading for the GesTecK dashboard.
//!
//! Every section is optional and falls back to the built-in defaults, but
//! unknown keys are rejected.

use gestek_core::{AccessMatrix, ConfigError, GridConfig, RoleConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "GESTEK_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub grid: GridConfig,
    pub logging: LoggingConfig,
    /// Role entries replacing the built-in ones.
    pub roles: Vec<RoleConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `GESTEK_LOG` is unset.
    pub directive: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: "gestek=info,warn".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Missing configuration file path (set GESTEK_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl DashboardConfig {
    /// Load from the file named by `GESTEK_CONFIG`.
    pub fn load() -> Result<Self, ConfigLoadError> {
        let path = config_path_from_env().ok_or(ConfigLoadError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    /// Load from the file at `path`, or the defaults when `GESTEK_CONFIG`
    /// is unset.
    pub fn load_or_default() -> Result<Self, ConfigLoadError> {
        match config_path_from_env() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigLoadError> {
        let config: DashboardConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        if self.logging.directive.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.directive".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        self.access_matrix()?;
        Ok(())
    }

    /// Built-in matrix with the configured role overrides and fallback.
    pub fn access_matrix(&self) -> Result<AccessMatrix, ConfigError> {
        AccessMatrix::builtin()
            .with_overrides(self.roles.clone())
            .and_then(|m| m.with_fallback(self.grid.fallback_role))
            .map_err(|e| ConfigError::InvalidValue {
                field: "roles".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}
