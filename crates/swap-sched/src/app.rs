//! Tracked application state.

use std::collections::BTreeSet;
use std::fmt;
use swap_cgroup::{CgroupResult, GroupController, GroupPath};
use tracing::{debug, warn};

use crate::message::AppId;

/// Lifecycle of a tracked application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Registered; its primary process may or may not have started
    Init,
    /// The primary process exited; children may still be running
    Ended,
    /// No member process left and the group was deleted
    Dead,
}

/// One application and the accounting group it runs in.
#[derive(Debug)]
pub struct AppRecord {
    id: AppId,
    group: GroupPath,
    label: String,
    state: AppState,
    /// Last soft limit written (0 = none)
    limit: u64,
    /// Fields below are refreshed by `refresh`
    rss_used: u64,
    pids: BTreeSet<u32>,
}

impl AppRecord {
    pub(crate) fn new(id: AppId, group: GroupPath, label: impl Into<String>) -> Self {
        Self {
            id,
            group,
            label: label.into(),
            state: AppState::Init,
            limit: 0,
            rss_used: 0,
            pids: BTreeSet::new(),
        }
    }

    /// Get the app ID.
    pub fn id(&self) -> AppId {
        self.id
    }

    /// Group the app's processes must be placed in.
    pub fn group(&self) -> &GroupPath {
        &self.group
    }

    /// Human-readable label (usually the desktop file or command).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// Last soft limit successfully written.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Usage as of the last refresh.
    pub fn rss_used(&self) -> u64 {
        self.rss_used
    }

    /// Member pids as of the last refresh.
    pub fn pids(&self) -> &BTreeSet<u32> {
        &self.pids
    }

    pub fn has_pid(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }

    pub fn is_live(&self) -> bool {
        self.state != AppState::Dead
    }

    /// Record that the primary process exited. Only moves Init to Ended.
    pub fn mark_ended(&mut self) -> bool {
        if self.state != AppState::Init {
            return false;
        }
        debug!("{} ended", self);
        self.state = AppState::Ended;
        true
    }

    /// Re-read member pids and usage.
    ///
    /// An Ended app with no members left becomes Dead and its group is
    /// deleted. Read failures keep the previous figures and state.
    pub fn refresh(&mut self, ctl: &dyn GroupController) {
        if !self.is_live() {
            return;
        }

        match ctl.list_pids(&self.group) {
            Ok(pids) => self.pids = pids,
            Err(e) => {
                warn!("Failed to list processes of {}: {}", self, e);
                return;
            }
        }

        if self.pids.is_empty() {
            self.rss_used = 0;
            if self.state == AppState::Ended {
                self.destroy(ctl);
            }
            return;
        }

        match ctl.aggregate_usage(&self.group) {
            Ok(used) => self.rss_used = used,
            Err(e) => warn!("Failed to read usage of {}: {}", self, e),
        }
    }

    /// Write a soft limit. A no-op on a Dead app.
    ///
    /// The recorded limit only changes when the write succeeds.
    pub fn set_limit(&mut self, ctl: &dyn GroupController, bytes: u64) -> CgroupResult<()> {
        if !self.is_live() {
            return Ok(());
        }
        ctl.set_soft_limit(&self.group, bytes)?;
        self.limit = bytes;
        Ok(())
    }

    /// Remove the soft limit. A no-op on a Dead app.
    pub fn cancel_limit(&mut self, ctl: &dyn GroupController) -> CgroupResult<()> {
        if !self.is_live() {
            return Ok(());
        }
        ctl.cancel_soft_limit(&self.group)?;
        self.limit = 0;
        Ok(())
    }

    fn destroy(&mut self, ctl: &dyn GroupController) {
        self.state = AppState::Dead;
        debug!("{} dead", self);

        if let Err(e) = ctl.delete(&self.group) {
            warn!("Failed to delete group of {}: {}", self, e);
        }
    }
}

impl fmt::Display for AppRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UIApp<{}>", self.group)
    }
}
