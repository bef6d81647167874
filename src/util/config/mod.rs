//! TianJi launch configuration
//!
//! Optional TOML configuration for the demo binary. CLI arguments take
//! priority over the file, the file over defaults.
//!
//! ```text
//! # tianji.toml
//! [launch]
//! thread_num = 2
//! block_dim = 2
//! transport = "shmem"      # or "registers"
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tianji.toml";

/// Demo launch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DemoConfig {
    /// Launch parameters
    #[serde(default)]
    pub launch: LaunchSection,
    /// Log settings
    #[serde(default)]
    pub log: LogSection,
}

/// Launch parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSection {
    /// Scheduler thread count
    #[serde(default = "default_thread_num")]
    pub thread_num: i32,
    /// Block count (one block = one compute core + two vector cores)
    #[serde(default = "default_block_dim")]
    pub block_dim: i32,
    /// Transport: "shmem" or "registers"
    #[serde(default)]
    pub transport: Option<String>,
}

fn default_thread_num() -> i32 {
    1
}

fn default_block_dim() -> i32 {
    1
}

impl Default for LaunchSection {
    fn default() -> Self {
        Self {
            thread_num: 1,
            block_dim: 1,
            transport: None,
        }
    }
}

/// Log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load configuration from the given path, or from `tianji.toml` in the
/// working directory. A missing file yields the defaults.
pub fn load(path: Option<&Path>) -> Result<DemoConfig, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
    if !path.exists() {
        return Ok(DemoConfig::default());
    }
    let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
