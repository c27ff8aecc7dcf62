//! Agent configuration.
//!
//! Loaded from a YAML file; every field has a default so a missing or
//! partial config still yields a working agent.

use crate::provider::ProviderConfig;
use crate::run::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider settings
    pub provider: ProviderConfig,
    /// Model override; falls back to the provider default
    pub model: Option<String>,
    /// System directive for every run
    pub system_prompt: String,
    /// Ceiling on LLM invocations per run
    pub max_loops: usize,
    /// Seconds before an unanswered confirmation counts as denied;
    /// absent means wait without bound
    pub confirm_timeout_secs: Option<u64>,
    /// SQLite database file; absent means in-memory
    pub db_path: Option<PathBuf>,
    /// Rows returned by the sample_table tool
    pub row_sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            provider: ProviderConfig::default(),
            model: None,
            system_prompt: run.system_prompt,
            max_loops: run.max_loops,
            confirm_timeout_secs: None,
            db_path: None,
            row_sample_size: 5,
        }
    }
}

impl Config {
    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Load from a YAML file if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading config");
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            system_prompt: self.system_prompt.clone(),
            max_loops: self.max_loops,
        }
    }
}
