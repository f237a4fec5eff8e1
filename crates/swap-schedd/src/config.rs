//! Daemon configuration: the scheduler settings plus apps to launch.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use swap_sched::SchedConfig;

/// Environment variable naming the config file when no argument is given
pub const CONFIG_ENV: &str = "SWAPSCHED_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub sched: SchedConfig,
    /// Applications started under the scheduler at startup
    pub apps: Vec<AppEntry>,
}

/// One application to launch.
#[derive(Debug, Clone, Deserialize)]
pub struct AppEntry {
    pub label: String,
    /// Program and arguments
    pub command: Vec<String>,
    /// Hard limit for this app's group, overriding `default_hard_limit`
    #[serde(default)]
    pub hard_limit: Option<u64>,
}

impl DaemonConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("In {}", path.display()))
    }
}

/// Config file from the first argument, then the environment.
pub fn config_path(arg: Option<String>) -> Option<PathBuf> {
    arg.or_else(|| std::env::var(CONFIG_ENV).ok())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}
