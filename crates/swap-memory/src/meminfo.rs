//! System and per-process memory counters.

use procfs::process::Process;
use procfs::{FromRead, Meminfo};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::units::KB;

/// System-wide memory figures taken once per rebalance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemMemorySnapshot {
    /// Physical memory size
    pub total_memory: u64,
    /// Memory immediately available before swapping (MemAvailable)
    pub free_memory: u64,
    /// Configured swap size
    pub swap_total: u64,
    /// Swap currently in use
    pub used_swap: u64,
}

/// Source of memory statistics.
pub trait MemoryStatReader: Send + Sync {
    /// Best-effort system snapshot. Missing fields read as zero.
    fn system_snapshot(&self) -> SystemMemorySnapshot;

    /// Sum of swap used by `pids`. Unreadable or exited processes count as zero.
    fn process_swap(&self, pids: &[u32]) -> u64;
}

/// Reader backed by a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcMemoryReader {
    proc_root: PathBuf,
}

impl ProcMemoryReader {
    /// Create a reader rooted at `proc_root` (normally `/proc`).
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Root this reader reads from.
    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// VmSwap of one process in bytes.
    fn vm_swap(&self, pid: u32) -> Option<u64> {
        let status = Process::new_with_root(self.proc_root.join(pid.to_string()))
            .and_then(|process| process.status());

        match status {
            Ok(status) => status.vmswap.map(|kb| kb.saturating_mul(KB)),
            Err(e) => {
                debug!("Failed to read status of pid {}: {}", pid, e);
                None
            }
        }
    }
}

impl Default for ProcMemoryReader {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl MemoryStatReader for ProcMemoryReader {
    fn system_snapshot(&self) -> SystemMemorySnapshot {
        let path = self.proc_root.join("meminfo");

        let meminfo = match Meminfo::from_file(&path) {
            Ok(meminfo) => meminfo,
            Err(e) => {
                warn!("{} unreadable ({}), using an empty memory snapshot", path.display(), e);
                return SystemMemorySnapshot::default();
            }
        };

        let free_memory = meminfo.mem_available.unwrap_or_else(|| {
            warn!("{} has no MemAvailable field, treating it as 0", path.display());
            0
        });

        SystemMemorySnapshot {
            total_memory: meminfo.mem_total,
            free_memory,
            swap_total: meminfo.swap_total,
            used_swap: meminfo.swap_total.saturating_sub(meminfo.swap_free),
        }
    }

    fn process_swap(&self, pids: &[u32]) -> u64 {
        pids.iter()
            .filter_map(|pid| self.vm_swap(*pid))
            .fold(0u64, u64::saturating_add)
    }
}
