//! The resource-group controller interface.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::path::{Controller, GroupPath};

/// Errors from a single group operation.
#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed content in {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },
}

impl CgroupError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying file or directory does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Result type for group operations
pub type CgroupResult<T> = Result<T, CgroupError>;

/// Operations on accounting groups, one controller serving every group.
///
/// Implementations must be usable from the periodic worker and from focus
/// callbacks, hence `Send + Sync`.
pub trait GroupController: Send + Sync {
    /// Whether `path` exists under `controller`.
    fn exists(&self, path: &GroupPath, controller: Controller) -> bool;

    /// Create the group under every controller. Existing groups are kept.
    fn create(&self, path: &GroupPath) -> CgroupResult<()>;

    /// Delete the group under every controller. A missing group is not an error.
    fn delete(&self, path: &GroupPath) -> CgroupResult<()>;

    /// Current member process ids. A missing group has no members.
    fn list_pids(&self, path: &GroupPath) -> CgroupResult<BTreeSet<u32>>;

    /// Cache + resident + mapped-file bytes charged to the group.
    fn aggregate_usage(&self, path: &GroupPath) -> CgroupResult<u64>;

    /// Set the advisory reclaim threshold.
    fn set_soft_limit(&self, path: &GroupPath, bytes: u64) -> CgroupResult<()>;

    /// Remove the advisory reclaim threshold.
    fn cancel_soft_limit(&self, path: &GroupPath) -> CgroupResult<()>;

    /// Set the hard cap. Only written when the group is created.
    fn set_hard_limit(&self, path: &GroupPath, bytes: u64) -> CgroupResult<()>;

    /// Pause every member process.
    fn freeze(&self, path: &GroupPath) -> CgroupResult<()>;

    /// Resume every member process. A missing group is not an error.
    fn thaw(&self, path: &GroupPath) -> CgroupResult<()>;
}
