//! Service configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via STATECHART_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on condition-transition firings per request.
    pub max_stabilization_iterations: usize,

    /// Maximum node count accepted per chart (0 = unlimited).
    pub max_chart_nodes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_stabilization_iterations: 32,
            max_chart_nodes: 0,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from file, then applies environment variable
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("STATECHART_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: ServiceConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("STATECHART_MAX_STABILIZATION_ITERATIONS") {
            if let Ok(parsed) = value.parse() {
                self.max_stabilization_iterations = parsed;
            }
        }
        if let Ok(value) = std::env::var("STATECHART_MAX_CHART_NODES") {
            if let Ok(parsed) = value.parse() {
                self.max_chart_nodes = parsed;
            }
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),
}
