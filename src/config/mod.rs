//! Configuration management for drover
//!
//! This module handles loading, parsing, and validating drover configuration
//! from YAML files. Every value here can be overridden by a CLI flag; the
//! file just moves the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pool::Backoff;

/// Main configuration structure for drover
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DroverConfig {
    /// Worker pool configuration
    #[serde(default)]
    pub pool: PoolSettings,

    /// Report and log file configuration
    #[serde(default)]
    pub report: ReportSettings,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSettings {
    /// Worker thread count (0 = one per CPU core)
    #[serde(default)]
    pub threads: usize,

    /// Retries per row after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Failed rows tolerated before the rest of the roster is discarded
    #[serde(default = "default_max_failures")]
    pub max_failures: usize,

    /// Delay between retries
    #[serde(default)]
    pub backoff: BackoffSettings,
}

/// Default retry budget per row
fn default_max_retries() -> usize {
    3
}

/// Default failure ceiling
fn default_max_failures() -> usize {
    1
}

/// Retry delay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackoffSettings {
    /// Delay policy between attempts on the same row
    #[serde(default)]
    pub policy: BackoffPolicy,

    /// Delay before the first retry (seconds)
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Ceiling for the exponential policy (seconds)
    #[serde(default = "default_cap_secs")]
    pub cap_secs: u64,
}

/// Default retry delay in seconds
fn default_delay_secs() -> u64 {
    1
}

/// Default exponential delay ceiling in seconds
fn default_cap_secs() -> u64 {
    60
}

/// Retry delay policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Same delay before every retry
    #[default]
    Fixed,

    /// Delay doubles after each failed attempt, up to the cap
    Exponential,
}

/// Report and log file configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSettings {
    /// Directory for log and report files
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,

    /// Filename prefix for log and outcome files
    #[serde(default = "default_report_prefix")]
    pub prefix: String,
}

/// Default report directory
fn default_report_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Default report filename prefix
fn default_report_prefix() -> String {
    "drover".to_string()
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            threads: 0,
            max_retries: default_max_retries(),
            max_failures: default_max_failures(),
            backoff: BackoffSettings::default(),
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            policy: BackoffPolicy::Fixed,
            delay_secs: default_delay_secs(),
            cap_secs: default_cap_secs(),
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: default_report_dir(),
            prefix: default_report_prefix(),
        }
    }
}

impl BackoffSettings {
    /// Convert into the pool's delay policy.
    pub fn to_backoff(&self) -> Backoff {
        match self.policy {
            BackoffPolicy::Fixed => Backoff::Fixed {
                delay: Duration::from_secs(self.delay_secs),
            },
            BackoffPolicy::Exponential => Backoff::Exponential {
                initial: Duration::from_secs(self.delay_secs),
                cap: Duration::from_secs(self.cap_secs),
            },
        }
    }
}

impl DroverConfig {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DroverConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = self.to_yaml()?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }

    /// Find configuration file in current directory or parent directories
    pub fn find_config_file() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join("drover.yml");
            if config_path.exists() {
                return Some(config_path);
            }

            let config_path = current.join(".drover.yml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Load from an explicit path, a discovered file, or defaults.
    ///
    /// An explicit path must load; a discovered file must parse. Silently
    /// falling back to defaults would hide a broken max_failures setting
    /// until rows start getting discarded.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::find_config_file() {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool.backoff.policy == BackoffPolicy::Exponential
            && self.pool.backoff.cap_secs < self.pool.backoff.delay_secs
        {
            anyhow::bail!(
                "Backoff cap ({}s) cannot be below the initial delay ({}s)",
                self.pool.backoff.cap_secs,
                self.pool.backoff.delay_secs
            );
        }

        if self.report.prefix.is_empty() {
            anyhow::bail!("Report prefix cannot be empty");
        }
        if self.report.prefix.contains(['/', '\\']) {
            anyhow::bail!("Report prefix cannot contain path separators");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
