//! Scheduler configuration
//!
//! Loaded from TOML. Every field has a default, so a partial file (or none
//! at all) yields a usable configuration once [`SchedConfig::validate`]
//! passes.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swap_memory::{SystemMemorySnapshot, GB, MB};
use thiserror::Error;

use crate::allocation::DEFAULT_ACTIVE_RESERVE;

/// Default sampling period in seconds
const DEFAULT_SAMPLE_PERIOD_SECS: u64 = 1;

/// Soft limit for the desktop-environment group
const DEFAULT_DESKTOP_SOFT_LIMIT: u64 = 800 * MB;

/// Complete scheduler configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedConfig {
    /// Where the cgroup-v1 hierarchies are mounted
    pub cgroup_mount: PathBuf,
    /// procfs mount used for memory statistics
    pub proc_root: PathBuf,
    /// Root group holding one child per tracked app. Must already exist
    /// under both the memory and freezer hierarchies.
    pub apps_group: String,
    /// Seconds between periodic passes
    pub sample_period_secs: u64,
    /// Margin kept back from the active app for everything else (bytes)
    pub active_reserve: u64,
    /// Hard limit written to every new app group (bytes, 0 = none)
    pub default_hard_limit: u64,
    /// Only apply limits under memory pressure (absent = always apply)
    pub activation: Option<ActivationConfig>,
    /// Fixed soft limit for desktop-environment components
    pub desktop_group: Option<DesktopGroupConfig>,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            cgroup_mount: PathBuf::from(swap_cgroup::DEFAULT_MOUNT),
            proc_root: PathBuf::from("/proc"),
            apps_group: String::from("swapsched/uiapps"),
            sample_period_secs: DEFAULT_SAMPLE_PERIOD_SECS,
            active_reserve: DEFAULT_ACTIVE_RESERVE,
            default_hard_limit: 0,
            activation: None,
            desktop_group: None,
        }
    }
}

impl SchedConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Interval between periodic passes
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs(self.sample_period_secs)
    }

    /// Hard limit for new groups, if any
    pub fn hard_limit(&self) -> Option<u64> {
        (self.default_hard_limit > 0).then_some(self.default_hard_limit)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apps_group.trim_matches('/').is_empty() {
            return Err(ConfigError::EmptyAppsGroup);
        }
        if self.sample_period_secs == 0 {
            return Err(ConfigError::ZeroSamplePeriod);
        }
        if let Some(activation) = &self.activation {
            if activation.disable_mem_avail_min < activation.enable_mem_avail_max {
                return Err(ConfigError::InvertedActivation);
            }
        }
        if let Some(desktop) = &self.desktop_group {
            if desktop.path.trim_matches('/').is_empty() {
                return Err(ConfigError::EmptyDesktopGroup);
            }
        }
        Ok(())
    }
}

/// Hysteresis deciding whether limits are applied at all.
///
/// Limits only help when there is swap to push background apps into, and
/// only matter once available memory runs low.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Never apply limits with less swap than this (bytes)
    pub enable_swap_total_min: u64,
    /// While inactive, start applying below this much available memory
    pub enable_mem_avail_max: u64,
    /// While active, stop applying above this much available memory
    pub disable_mem_avail_min: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            enable_swap_total_min: GB,
            enable_mem_avail_max: GB,
            disable_mem_avail_min: 2 * GB,
        }
    }
}

impl ActivationConfig {
    /// Whether limits should be in force, given the current state.
    pub fn should_apply(&self, enabled: bool, snapshot: &SystemMemorySnapshot) -> bool {
        if snapshot.swap_total < self.enable_swap_total_min {
            return false;
        }
        if enabled {
            snapshot.free_memory <= self.disable_mem_avail_min
        } else {
            snapshot.free_memory < self.enable_mem_avail_max
        }
    }
}

/// Pre-provisioned group for desktop-environment components.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DesktopGroupConfig {
    /// Group path relative to the memory hierarchy
    pub path: String,
    /// Soft limit applied on every pass (bytes)
    pub soft_limit: u64,
}

impl Default for DesktopGroupConfig {
    fn default() -> Self {
        Self {
            path: String::from("swapsched/DE"),
            soft_limit: DEFAULT_DESKTOP_SOFT_LIMIT,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("apps_group must name a group below the hierarchy root")]
    EmptyAppsGroup,

    #[error("desktop_group.path must name a group below the hierarchy root")]
    EmptyDesktopGroup,

    #[error("sample_period_secs must be at least 1")]
    ZeroSamplePeriod,

    #[error("activation.disable_mem_avail_min is below activation.enable_mem_avail_max")]
    InvertedActivation,

    #[error("Cannot read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Invalid TOML: {0}")]
    Parse(String),
}
