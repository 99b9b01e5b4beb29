//! User configuration (`~/.config/keel/config.toml`)
//!
//! Every field is optional. Command line flags win over the file, the file
//! wins over built-in defaults.

use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API used when neither the flag, the environment nor the file name one
pub const DEFAULT_API_URL: &str = "http://localhost:8080/v1";

/// Output directory used when none is configured, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "infrastructure";

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("keel"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub output_dir: Option<String>,
    pub jobs: Option<usize>,
    pub retry: RetrySection,
}

/// The `[retry]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_secs: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_delay_secs: Option<u64>,
}

impl Config {
    /// Load the user config, or defaults when there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve the effective settings, flags first
    pub fn resolve(&self, api_url: Option<&str>, output_dir: Option<&Path>) -> Settings {
        let api_url = api_url
            .map(str::to_string)
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let output_dir = match (output_dir, &self.output_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => PathBuf::from(shellexpand::tilde(dir).as_ref()),
            (None, None) => PathBuf::from(DEFAULT_OUTPUT_DIR),
        };

        Settings {
            api_url: api_url.trim_end_matches('/').to_string(),
            output_dir,
            jobs: self.jobs.unwrap_or(1).max(1),
            retry: self.retry.to_config(),
        }
    }
}

impl RetrySection {
    fn to_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: self
                .base_delay_secs
                .map_or(defaults.base_delay, Duration::from_secs),
            backoff_factor: self.backoff_factor.unwrap_or(defaults.backoff_factor),
            max_delay: self
                .max_delay_secs
                .map_or(defaults.max_delay, Duration::from_secs),
        }
    }
}

/// Settings a command runs with
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    /// Parent of the per-environment output directories
    pub output_dir: PathBuf,
    pub jobs: usize,
    pub retry: RetryConfig,
}

impl Settings {
    /// Output directory of one environment
    pub fn environment_dir(&self, environment: &str) -> PathBuf {
        self.output_dir.join(environment)
    }
}
