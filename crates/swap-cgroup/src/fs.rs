//! cgroup-v1 filesystem backend.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::controller::{CgroupError, CgroupResult, GroupController};
use crate::path::{Controller, GroupPath};

/// Default mount point of the cgroup-v1 hierarchies
pub const DEFAULT_MOUNT: &str = "/sys/fs/cgroup";

const PROCS_FILE: &str = "cgroup.procs";
const STAT_FILE: &str = "memory.stat";
const SOFT_LIMIT_FILE: &str = "memory.soft_limit_in_bytes";
const HARD_LIMIT_FILE: &str = "memory.limit_in_bytes";
const FREEZER_STATE_FILE: &str = "freezer.state";

/// Counters summed into a group's usage figure
const USAGE_COUNTERS: [&str; 3] = ["cache", "rss", "mapped_file"];

/// Controller writing directly to cgroup-v1 control files.
#[derive(Debug, Clone)]
pub struct CgroupFs {
    mount: PathBuf,
}

impl CgroupFs {
    /// Create a backend for hierarchies mounted under `mount`.
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
        }
    }

    /// Mount point this backend operates on.
    pub fn mount(&self) -> &Path {
        &self.mount
    }

    /// Directory of `path` within `controller`'s hierarchy.
    pub fn group_dir(&self, path: &GroupPath, controller: Controller) -> PathBuf {
        let mut dir = self.mount.join(controller.name());
        if !path.is_empty() {
            dir.push(path.as_str());
        }
        dir
    }

    fn write_value(
        &self,
        path: &GroupPath,
        controller: Controller,
        file: &str,
        value: &str,
    ) -> CgroupResult<()> {
        let target = self.group_dir(path, controller).join(file);
        // Control files always exist in a live group; never create one.
        let mut f = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&target)
            .map_err(|e| CgroupError::io(&target, e))?;
        f.write_all(value.as_bytes())
            .map_err(|e| CgroupError::io(&target, e))
    }
}

impl Default for CgroupFs {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT)
    }
}

impl GroupController for CgroupFs {
    fn exists(&self, path: &GroupPath, controller: Controller) -> bool {
        self.group_dir(path, controller).is_dir()
    }

    fn create(&self, path: &GroupPath) -> CgroupResult<()> {
        for controller in Controller::ALL {
            let dir = self.group_dir(path, controller);
            fs::create_dir_all(&dir).map_err(|e| CgroupError::io(&dir, e))?;
        }
        debug!("Created group {}", path);
        Ok(())
    }

    fn delete(&self, path: &GroupPath) -> CgroupResult<()> {
        for controller in Controller::ALL {
            let dir = self.group_dir(path, controller);
            match fs::remove_dir(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(CgroupError::io(&dir, e)),
            }
        }
        debug!("Deleted group {}", path);
        Ok(())
    }

    fn list_pids(&self, path: &GroupPath) -> CgroupResult<BTreeSet<u32>> {
        let procs = self.group_dir(path, Controller::Memory).join(PROCS_FILE);
        let text = match fs::read_to_string(&procs) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(CgroupError::io(&procs, e)),
        };
        parse_pids(&text).map_err(|detail| CgroupError::Parse {
            path: procs,
            detail,
        })
    }

    fn aggregate_usage(&self, path: &GroupPath) -> CgroupResult<u64> {
        let stat = self.group_dir(path, Controller::Memory).join(STAT_FILE);
        let text = fs::read_to_string(&stat).map_err(|e| CgroupError::io(&stat, e))?;
        Ok(parse_usage(&text))
    }

    fn set_soft_limit(&self, path: &GroupPath, bytes: u64) -> CgroupResult<()> {
        self.write_value(path, Controller::Memory, SOFT_LIMIT_FILE, &bytes.to_string())
    }

    fn cancel_soft_limit(&self, path: &GroupPath) -> CgroupResult<()> {
        self.write_value(path, Controller::Memory, SOFT_LIMIT_FILE, "-1")
    }

    fn set_hard_limit(&self, path: &GroupPath, bytes: u64) -> CgroupResult<()> {
        self.write_value(path, Controller::Memory, HARD_LIMIT_FILE, &bytes.to_string())
    }

    fn freeze(&self, path: &GroupPath) -> CgroupResult<()> {
        self.write_value(path, Controller::Freezer, FREEZER_STATE_FILE, "FROZEN")
    }

    fn thaw(&self, path: &GroupPath) -> CgroupResult<()> {
        match self.write_value(path, Controller::Freezer, FREEZER_STATE_FILE, "THAWED") {
            Err(e) if e.is_not_found() => {
                debug!("Group {} vanished before thaw", path);
                Ok(())
            }
            other => other,
        }
    }
}

fn parse_pids(text: &str) -> Result<BTreeSet<u32>, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<u32>().map_err(|e| format!("bad pid {:?}: {}", l, e)))
        .collect()
}

/// Sum of the usage counters in a `memory.stat` body. Absent counters are 0.
fn parse_usage(text: &str) -> u64 {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let (name, value) = (parts.next()?, parts.next()?);
            if USAGE_COUNTERS.contains(&name) {
                value.parse::<u64>().ok()
            } else {
                None
            }
        })
        .fold(0u64, u64::saturating_add)
}
