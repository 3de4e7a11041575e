//! Configuration loading for testrig-harness.
//!
//! Configuration is loaded from a TOML file (default: `rig.toml`). Every
//! section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    /// How a suite run behaves.
    #[serde(default)]
    pub run: RunConfig,
    /// Where and what the run writes to disk.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Slash-separated filter pattern (default: empty, run everything).
    #[serde(default)]
    pub filter: String,
    /// Maximum bodies running at once; 0 means one per CPU (default: 0).
    #[serde(default)]
    pub parallel: usize,
    /// Skip the remaining tests of a level once one of them fails
    /// (default: false).
    #[serde(default)]
    pub fail_fast: bool,
    /// Report passing and skipped tests too, not only failures
    /// (default: false).
    #[serde(default)]
    pub verbose: bool,
    /// Only run root tests in this `hash:m/n` shard (default: none).
    #[serde(default)]
    pub sharding: Option<String>,
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the report files (default: `_harness_temp`).
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Write `test.tap` (default: true).
    #[serde(default = "default_enabled")]
    pub tap: bool,
    /// Write `reports/report.json` (default: true).
    #[serde(default = "default_enabled")]
    pub json: bool,
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("_harness_temp")
}

fn default_enabled() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            filter: String::new(),
            parallel: 0,
            fail_fast: false,
            verbose: false,
            sharding: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            tap: default_enabled(),
            json: default_enabled(),
        }
    }
}

impl RunConfig {
    /// Effective parallelism cap, resolving 0 to the number of CPUs.
    pub fn parallelism(&self) -> usize {
        if self.parallel > 0 {
            return self.parallel;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
