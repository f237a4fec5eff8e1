//! Dispatcher: tracks the active and inactive apps and rebalances limits.
//!
//! A pass ([`Dispatcher::rebalance`]) runs periodically and after every
//! focus switch:
//!
//! 1. freeze every live app group
//! 2. take a system snapshot and refresh each app (dropping dead ones)
//! 3. compute an [`Allocation`]
//! 4. write the root, active and inactive soft limits
//! 5. thaw (always, through [`FreezeGuard`])
//!
//! A failed write is logged and leaves that group's previous limit in place;
//! it never stops the pass.

use std::collections::BTreeMap;
use std::sync::Arc;
use swap_cgroup::{CgroupError, Controller, FreezeGuard, GroupController, GroupPath};
use swap_memory::{MemoryStatReader, SystemMemorySnapshot};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::allocation::{Allocation, AllocationInput};
use crate::app::AppRecord;
use crate::config::{ConfigError, SchedConfig};
use crate::message::{AppId, FocusOutcome};

/// Dispatcher errors
#[derive(Debug, Error)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Group {path} is missing from the {controller} hierarchy")]
    MissingHierarchy {
        path: GroupPath,
        controller: Controller,
    },

    #[error("Group operation failed: {0}")]
    Group(#[from] CgroupError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Owner of every tracked app.
pub struct Dispatcher {
    config: SchedConfig,
    ctl: Arc<dyn GroupController>,
    reader: Arc<dyn MemoryStatReader>,
    apps_group: GroupPath,
    desktop_group: Option<(GroupPath, u64)>,
    /// Last sequence number handed out
    seq: u32,
    active: Option<AppRecord>,
    /// Most recently demoted first
    inactive: Vec<AppRecord>,
    focused_window: Option<u64>,
    /// Whether limits are currently in force
    enabled: bool,
    /// Set once by `stop`; no pass runs afterwards
    stopped: bool,
    passes: u64,
}

/// Which tracked app owns a pid.
enum Owner {
    Active,
    Inactive(usize),
}

impl Dispatcher {
    /// Create a dispatcher over a pre-provisioned group tree.
    ///
    /// Fails if the apps group is missing from the memory or freezer
    /// hierarchy, or a configured desktop group from the memory hierarchy.
    pub fn new(
        config: SchedConfig,
        ctl: Arc<dyn GroupController>,
        reader: Arc<dyn MemoryStatReader>,
    ) -> Result<Self, SchedError> {
        config.validate()?;

        let apps_group = GroupPath::new(&config.apps_group);
        for controller in Controller::ALL {
            if !ctl.exists(&apps_group, controller) {
                return Err(SchedError::MissingHierarchy {
                    path: apps_group,
                    controller,
                });
            }
        }

        let desktop_group = match &config.desktop_group {
            Some(desktop) => {
                let path = GroupPath::new(&desktop.path);
                if !ctl.exists(&path, Controller::Memory) {
                    return Err(SchedError::MissingHierarchy {
                        path,
                        controller: Controller::Memory,
                    });
                }
                Some((path, desktop.soft_limit))
            }
            None => None,
        };

        info!("Dispatcher ready on group {}", apps_group);

        Ok(Self {
            // Without activation thresholds limits are always in force.
            enabled: config.activation.is_none(),
            config,
            ctl,
            reader,
            apps_group,
            desktop_group,
            seq: 0,
            active: None,
            inactive: Vec::new(),
            focused_window: None,
            stopped: false,
            passes: 0,
        })
    }

    /// Create the group for a new application.
    ///
    /// The caller places the app's processes in [`AppRecord::group`] and then
    /// hands the record back through [`Dispatcher::track_app`].
    pub fn register_app(
        &mut self,
        label: &str,
        hard_limit: Option<u64>,
    ) -> Result<AppRecord, SchedError> {
        self.seq += 1;
        let id = AppId::new(self.seq);
        let group = self.apps_group.child(id.0);

        self.ctl.create(&group)?;

        if let Some(bytes) = hard_limit.or_else(|| self.config.hard_limit()) {
            if let Err(e) = self.ctl.set_hard_limit(&group, bytes) {
                if let Err(del) = self.ctl.delete(&group) {
                    warn!("Failed to remove group {} after error: {}", group, del);
                }
                return Err(e.into());
            }
        }

        debug!("Registered {} as {} in {}", label, id, group);
        Ok(AppRecord::new(id, group, label))
    }

    /// Start tracking a registered app as inactive.
    pub fn track_app(&mut self, app: AppRecord) -> AppId {
        debug!("Tracking {}", app);
        let id = app.id();
        self.inactive.push(app);
        id
    }

    /// Record that an app's primary process exited.
    ///
    /// Returns false if the app is unknown or already ended.
    pub fn mark_ended(&mut self, id: AppId) -> bool {
        self.app_mut(id).is_some_and(AppRecord::mark_ended)
    }

    /// Handle a foreground-window change.
    ///
    /// Repeated notifications for the same window do nothing. A pid of 0 or
    /// one owned by no tracked app leaves the active app as it is. When the
    /// pid is unknown, member pids are re-read once before giving up, so a
    /// just-launched app is found before the next periodic pass.
    pub fn on_focus_changed(&mut self, pid: u32, window_id: u64) -> FocusOutcome {
        if self.stopped {
            return FocusOutcome::Stopped;
        }
        if self.focused_window == Some(window_id) {
            return FocusOutcome::Unchanged;
        }
        self.focused_window = Some(window_id);

        if pid == 0 {
            debug!("Window {} has no owning process", window_id);
            return FocusOutcome::Ignored;
        }

        let mut owner = self.owner_of(pid);
        if owner.is_none() {
            self.refresh_apps();
            owner = self.owner_of(pid);
        }

        let pos = match owner {
            Some(Owner::Inactive(pos)) => pos,
            Some(Owner::Active) => return FocusOutcome::AlreadyActive,
            None => {
                debug!("Pid {} (window {}) is not tracked", pid, window_id);
                return FocusOutcome::NotTracked;
            }
        };

        let app = self.inactive.remove(pos);
        let id = app.id();
        info!("Focus moved to {} ({})", app, app.label());
        if let Some(previous) = self.active.replace(app) {
            self.inactive.insert(0, previous);
        }

        self.rebalance();
        FocusOutcome::Switched(id)
    }

    /// Recompute and apply limits.
    ///
    /// Returns the allocation applied, or `None` while limits are held off
    /// by the activation thresholds or after [`Dispatcher::stop`]. Groups are
    /// only frozen on passes that write limits.
    pub fn rebalance(&mut self) -> Option<Allocation> {
        if self.stopped {
            return None;
        }
        self.passes += 1;

        let snapshot = self.reader.system_snapshot();
        let apply = self.should_apply(&snapshot);

        if !apply {
            self.refresh_apps();
            if self.enabled {
                self.enabled = false;
                info!("Memory pressure gone, cancelling limits");
                self.cancel_limits();
            }
            return None;
        }
        if !self.enabled {
            self.enabled = true;
            info!("Memory is low, applying limits");
        }

        let ctl = Arc::clone(&self.ctl);
        let live = self.live_groups();
        let _frozen = FreezeGuard::freeze(ctl.as_ref(), &live);
        self.refresh_apps();

        let allocation = self.compute(&snapshot);
        match &self.active {
            Some(app) => debug!("Active {} ({}): {}", app, app.label(), allocation),
            None => debug!("No active app (window {:?}): {}", self.focused_window, allocation),
        }
        self.apply(&allocation);
        Some(allocation)
    }

    /// Remove every soft limit this dispatcher writes.
    pub fn cancel_limits(&mut self) {
        let ctl = self.ctl.as_ref();

        if let Err(e) = ctl.cancel_soft_limit(&self.apps_group) {
            warn!("Failed to cancel soft limit of {}: {}", self.apps_group, e);
        }
        for app in self.active.iter_mut().chain(self.inactive.iter_mut()) {
            if let Err(e) = app.cancel_limit(ctl) {
                warn!("Failed to cancel soft limit of {}: {}", app, e);
            }
        }
        if let Some((path, _)) = &self.desktop_group {
            if let Err(e) = ctl.cancel_soft_limit(path) {
                warn!("Failed to cancel soft limit of desktop group {}: {}", path, e);
            }
        }
    }

    /// Remove every soft limit and refuse further passes and focus changes.
    ///
    /// Handles cloned before shutdown may still deliver events; they become
    /// no-ops instead of writing limits back.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.cancel_limits();
        info!("Dispatcher stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Window id of the last focus notification.
    pub fn focused_window(&self) -> Option<u64> {
        self.focused_window
    }

    /// Label of every tracked app, keyed by sequence number.
    pub fn apps_by_seq(&self) -> BTreeMap<u32, String> {
        self.active
            .iter()
            .chain(self.inactive.iter())
            .map(|app| (app.id().0, app.label().to_string()))
            .collect()
    }

    pub fn active_app(&self) -> Option<&AppRecord> {
        self.active.as_ref()
    }

    pub fn inactive_apps(&self) -> &[AppRecord] {
        &self.inactive
    }

    /// Root group holding every app group.
    pub fn apps_group(&self) -> &GroupPath {
        &self.apps_group
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// Whether limits are currently in force.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of passes run so far.
    pub fn rebalance_count(&self) -> u64 {
        self.passes
    }

    fn app_mut(&mut self, id: AppId) -> Option<&mut AppRecord> {
        self.active
            .iter_mut()
            .chain(self.inactive.iter_mut())
            .find(|app| app.id() == id)
    }

    fn owner_of(&self, pid: u32) -> Option<Owner> {
        if self.active.as_ref().is_some_and(|app| app.has_pid(pid)) {
            return Some(Owner::Active);
        }
        self.inactive
            .iter()
            .position(|app| app.has_pid(pid))
            .map(Owner::Inactive)
    }

    fn live_groups(&self) -> Vec<GroupPath> {
        self.active
            .iter()
            .chain(self.inactive.iter())
            .filter(|app| app.is_live())
            .map(|app| app.group().clone())
            .collect()
    }

    fn refresh_apps(&mut self) {
        let ctl = self.ctl.as_ref();

        for app in &mut self.inactive {
            app.refresh(ctl);
        }
        self.inactive.retain(|app| {
            if !app.is_live() {
                debug!("Removing {} from inactive apps", app);
            }
            app.is_live()
        });

        let active_dead = match &mut self.active {
            Some(app) => {
                app.refresh(ctl);
                !app.is_live()
            }
            None => false,
        };
        if active_dead {
            debug!("Active app is gone");
            self.active = None;
        }
    }

    fn should_apply(&self, snapshot: &SystemMemorySnapshot) -> bool {
        match &self.config.activation {
            Some(activation) => activation.should_apply(self.enabled, snapshot),
            None => true,
        }
    }

    fn compute(&self, snapshot: &SystemMemorySnapshot) -> Allocation {
        let (active_rss, active_swap) = match &self.active {
            Some(app) => {
                let swap = if snapshot.used_swap > 0 {
                    let pids: Vec<u32> = app.pids().iter().copied().collect();
                    self.reader.process_swap(&pids)
                } else {
                    0
                };
                (app.rss_used(), swap)
            }
            None => (0, 0),
        };

        let inactive_rss = self
            .inactive
            .iter()
            .filter(|app| app.is_live())
            .map(AppRecord::rss_used)
            .fold(0u64, u64::saturating_add);

        Allocation::compute(AllocationInput {
            free_memory: snapshot.free_memory,
            active_rss,
            active_swap,
            inactive_rss,
            reserve: self.config.active_reserve,
        })
    }

    fn apply(&mut self, allocation: &Allocation) {
        let ctl = self.ctl.as_ref();

        if let Err(e) = ctl.set_soft_limit(&self.apps_group, allocation.ui_apps_limit) {
            warn!("Failed to set soft limit of {}: {}", self.apps_group, e);
        }

        if let Some(app) = &mut self.active {
            if let Err(e) = app.set_limit(ctl, allocation.active_app_limit) {
                warn!("Failed to set soft limit of active {}: {}", app, e);
            }
        }

        for app in &mut self.inactive {
            if let Err(e) = app.set_limit(ctl, allocation.inactive_app_limit) {
                warn!("Failed to set soft limit of inactive {}: {}", app, e);
            }
        }

        if let Some((path, limit)) = &self.desktop_group {
            if let Err(e) = ctl.set_soft_limit(path, *limit) {
                warn!("Failed to set soft limit of desktop group {}: {}", path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppState;
    use crate::config::{ActivationConfig, DesktopGroupConfig};
    use crate::testing::{FakeGroups, FakeMemory};
    use swap_memory::{GB, MB};

    const ROOT: &str = "c2@dde/uiapps";

    fn snapshot(free: u64) -> SystemMemorySnapshot {
        SystemMemorySnapshot {
            total_memory: 8 * GB,
            free_memory: free,
            swap_total: 4 * GB,
            used_swap: 0,
        }
    }

    fn config() -> SchedConfig {
        SchedConfig {
            apps_group: ROOT.to_string(),
            ..SchedConfig::default()
        }
    }

    fn setup(config: SchedConfig) -> (Dispatcher, FakeGroups, FakeMemory) {
        let groups = FakeGroups::with_root(ROOT);
        let memory = FakeMemory::new(snapshot(2000 * MB));
        let dispatcher =
            Dispatcher::new(config, Arc::new(groups.clone()), Arc::new(memory.clone())).unwrap();
        (dispatcher, groups, memory)
    }

    /// Register and track an app whose group holds `pids` using `usage` bytes.
    fn launch(d: &mut Dispatcher, groups: &FakeGroups, pids: &[u32], usage: u64) -> AppId {
        let app = d.register_app("app.desktop", None).unwrap();
        groups.set_members(app.group(), pids, usage);
        d.track_app(app)
    }

    fn group_of(id: AppId) -> GroupPath {
        GroupPath::new(ROOT).child(id.0)
    }

    #[test]
    fn test_missing_hierarchy_is_fatal() {
        let groups = FakeGroups::new();
        groups.provision(ROOT, &[Controller::Memory]);
        let memory = FakeMemory::new(snapshot(GB));

        let err = Dispatcher::new(config(), Arc::new(groups), Arc::new(memory))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SchedError::MissingHierarchy {
                controller: Controller::Freezer,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let groups = FakeGroups::with_root(ROOT);
        let mut config = config();
        config.sample_period_secs = 0;

        let result = Dispatcher::new(config, Arc::new(groups), Arc::new(FakeMemory::default()));
        assert!(matches!(result, Err(SchedError::Config(_))));
    }

    #[test]
    fn test_register_numbers_groups() {
        let (mut d, groups, _) = setup(config());

        let first = d.register_app("a.desktop", None).unwrap();
        let second = d.register_app("b.desktop", Some(GB)).unwrap();

        assert_eq!(first.group().as_str(), "c2@dde/uiapps/1");
        assert_eq!(second.group().as_str(), "c2@dde/uiapps/2");
        assert!(groups.exists_group(first.group()));
        assert_eq!(groups.hard_limit(first.group()), None);
        assert_eq!(groups.hard_limit(second.group()), Some(GB));
        assert_eq!(first.state(), AppState::Init);
    }

    #[test]
    fn test_default_hard_limit() {
        let mut config = config();
        config.default_hard_limit = 3 * GB;
        let (mut d, groups, _) = setup(config);

        let app = d.register_app("a.desktop", None).unwrap();
        assert_eq!(groups.hard_limit(app.group()), Some(3 * GB));
    }

    #[test]
    fn test_spec_allocation_is_applied() {
        let (mut d, groups, _) = setup(config());
        let active = launch(&mut d, &groups, &[100], 500 * MB);
        let b = launch(&mut d, &groups, &[200], 150 * MB);
        let c = launch(&mut d, &groups, &[300], 150 * MB);

        d.rebalance();
        assert!(matches!(d.on_focus_changed(100, 1), FocusOutcome::Switched(id) if id == active));

        let allocation = d.rebalance().unwrap();
        assert_eq!(allocation.ui_apps_limit, 2800 * MB);
        assert_eq!(allocation.active_app_limit, 2700 * MB);
        assert_eq!(allocation.inactive_app_limit, 1500 * MB);

        assert_eq!(groups.soft_limit(&GroupPath::new(ROOT)), Some(2800 * MB));
        assert_eq!(groups.soft_limit(&group_of(active)), Some(2700 * MB));
        assert_eq!(groups.soft_limit(&group_of(b)), Some(1500 * MB));
        assert_eq!(groups.soft_limit(&group_of(c)), Some(1500 * MB));
        assert_eq!(d.active_app().unwrap().limit(), 2700 * MB);
    }

    #[test]
    fn test_focus_switch_swaps_roles_and_rebalances_once() {
        let (mut d, groups, _) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        let b = launch(&mut d, &groups, &[200], 300 * MB);
        d.rebalance();
        d.on_focus_changed(100, 11);
        assert_eq!(d.active_app().unwrap().id(), a);

        let before = d.rebalance_count();
        let outcome = d.on_focus_changed(200, 22);

        assert_eq!(outcome, FocusOutcome::Switched(b));
        assert_eq!(d.rebalance_count(), before + 1);
        assert_eq!(d.active_app().unwrap().id(), b);
        assert_eq!(d.inactive_apps()[0].id(), a);
        assert_eq!(d.inactive_apps().len(), 1);
        assert_eq!(groups.soft_limit(&group_of(b)), Some(2700 * MB));
    }

    #[test]
    fn test_same_window_is_idempotent() {
        let (mut d, groups, _) = setup(config());
        launch(&mut d, &groups, &[100], 500 * MB);
        launch(&mut d, &groups, &[200], 300 * MB);
        d.rebalance();

        d.on_focus_changed(200, 7);
        let passes = d.rebalance_count();
        let active = d.active_app().unwrap().id();
        let inactive: Vec<AppId> = d.inactive_apps().iter().map(AppRecord::id).collect();
        groups.clear_events();

        assert_eq!(d.on_focus_changed(200, 7), FocusOutcome::Unchanged);
        assert_eq!(d.on_focus_changed(100, 7), FocusOutcome::Unchanged);

        assert_eq!(d.rebalance_count(), passes);
        assert_eq!(d.active_app().unwrap().id(), active);
        let after: Vec<AppId> = d.inactive_apps().iter().map(AppRecord::id).collect();
        assert_eq!(after, inactive);
        assert!(groups.events().is_empty());
    }

    #[test]
    fn test_zero_pid_keeps_active_app() {
        let (mut d, groups, _) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);
        let passes = d.rebalance_count();

        assert_eq!(d.on_focus_changed(0, 2), FocusOutcome::Ignored);
        assert_eq!(d.active_app().unwrap().id(), a);
        assert_eq!(d.rebalance_count(), passes);
    }

    #[test]
    fn test_untracked_pid_keeps_active_app() {
        let (mut d, groups, _) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);

        assert_eq!(d.on_focus_changed(4242, 2), FocusOutcome::NotTracked);
        assert_eq!(d.active_app().unwrap().id(), a);
        assert_eq!(d.on_focus_changed(100, 3), FocusOutcome::AlreadyActive);
    }

    #[test]
    fn test_ended_app_is_dropped_after_refresh() {
        let (mut d, groups, _) = setup(config());
        let active = launch(&mut d, &groups, &[100], 500 * MB);
        let gone = launch(&mut d, &groups, &[200], 150 * MB);
        launch(&mut d, &groups, &[300], 150 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);

        assert!(d.mark_ended(gone));
        let gone_group = group_of(gone);
        groups.set_members(&gone_group, &[], 0);

        let allocation = d.rebalance().unwrap();

        assert_eq!(groups.delete_count(&gone_group), 1);
        assert!(!groups.exists_group(&gone_group));
        assert_eq!(allocation.input.inactive_rss, 150 * MB);
        assert_eq!(d.inactive_apps().len(), 1);
        assert!(!d.apps_by_seq().contains_key(&gone.0));
        assert_eq!(d.active_app().unwrap().id(), active);

        d.rebalance();
        assert_eq!(groups.delete_count(&gone_group), 1);
    }

    #[test]
    fn test_dead_active_app_is_cleared() {
        let (mut d, groups, _) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);

        d.mark_ended(a);
        groups.set_members(&group_of(a), &[], 0);
        let allocation = d.rebalance().unwrap();

        assert!(d.active_app().is_none());
        assert_eq!(allocation.active_app_limit, 0);
    }

    #[test]
    fn test_failed_write_does_not_stop_pass() {
        let (mut d, groups, memory) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        let b = launch(&mut d, &groups, &[200], 150 * MB);
        let c = launch(&mut d, &groups, &[300], 150 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);
        let b_limit = d.inactive_apps().iter().find(|x| x.id() == b).unwrap().limit();

        groups.fail_writes(&group_of(b));
        memory.set_free(1000 * MB);
        d.rebalance();

        let b_app = d.inactive_apps().iter().find(|x| x.id() == b).unwrap();
        assert_eq!(b_app.limit(), b_limit);
        assert_eq!(groups.soft_limit(&group_of(c)), Some(500 * MB));
        assert_eq!(groups.soft_limit(&group_of(a)), Some(1700 * MB));
        assert!(!groups.any_frozen());
    }

    #[test]
    fn test_writes_happen_inside_freeze_bracket() {
        let (mut d, groups, _) = setup(config());
        launch(&mut d, &groups, &[100], 500 * MB);
        launch(&mut d, &groups, &[200], 150 * MB);
        groups.clear_events();

        d.rebalance();

        let events = groups.events();
        let first_write = events.iter().position(|e| e.starts_with("soft")).unwrap();
        let last_write = events.iter().rposition(|e| e.starts_with("soft")).unwrap();
        let freezes = events.iter().filter(|e| e.starts_with("freeze")).count();
        let thaws: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with("thaw"))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(freezes, 2);
        assert_eq!(thaws.len(), 2);
        assert!(events[..first_write].iter().filter(|e| e.starts_with("freeze")).count() == 2);
        assert!(thaws.iter().all(|&i| i > last_write));
        assert!(!groups.any_frozen());
    }

    #[test]
    fn test_activation_thresholds() {
        let mut config = config();
        config.activation = Some(ActivationConfig::default());
        let (mut d, groups, memory) = setup(config);
        let a = launch(&mut d, &groups, &[100], 500 * MB);

        // 2000 MB available: limits stay off, pids still refresh.
        assert!(d.rebalance().is_none());
        assert!(!d.is_enabled());
        assert!(d.inactive_apps()[0].has_pid(100));
        assert_eq!(groups.soft_limit(&GroupPath::new(ROOT)), None);
        assert!(groups.events().is_empty());

        memory.set_free(512 * MB);
        assert!(d.rebalance().is_some());
        assert!(d.is_enabled());
        assert!(groups.soft_limit(&group_of(a)).is_some());

        memory.set_free(3 * GB);
        groups.clear_events();
        assert!(d.rebalance().is_none());
        assert!(!d.is_enabled());
        assert!(!groups.events().iter().any(|e| e.starts_with("freeze")));
        assert_eq!(groups.soft_limit(&GroupPath::new(ROOT)), None);
        assert_eq!(groups.soft_limit(&group_of(a)), None);
        assert_eq!(d.inactive_apps()[0].limit(), 0);
    }

    #[test]
    fn test_desktop_group_limit() {
        let mut config = config();
        config.desktop_group = Some(DesktopGroupConfig {
            path: "c2@dde/DE".to_string(),
            soft_limit: 800 * MB,
        });

        let groups = FakeGroups::with_root(ROOT);
        let memory = FakeMemory::new(snapshot(GB));
        let missing = Dispatcher::new(
            config.clone(),
            Arc::new(groups.clone()),
            Arc::new(memory.clone()),
        );
        assert!(matches!(missing, Err(SchedError::MissingHierarchy { .. })));

        groups.provision("c2@dde/DE", &[Controller::Memory]);
        let mut d = Dispatcher::new(config, Arc::new(groups.clone()), Arc::new(memory)).unwrap();
        d.rebalance();
        assert_eq!(groups.soft_limit(&GroupPath::new("c2@dde/DE")), Some(800 * MB));

        d.cancel_limits();
        assert_eq!(groups.soft_limit(&GroupPath::new("c2@dde/DE")), None);
    }

    #[test]
    fn test_active_swap_counts_when_swap_in_use() {
        let (mut d, groups, memory) = setup(config());
        launch(&mut d, &groups, &[100, 101], 500 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);

        memory.set_swap(100, 150 * MB);
        memory.set_swap(101, 50 * MB);
        assert_eq!(d.rebalance().unwrap().input.active_swap, 0);

        memory.set_snapshot(SystemMemorySnapshot {
            used_swap: GB,
            ..snapshot(2000 * MB)
        });
        let allocation = d.rebalance().unwrap();
        assert_eq!(allocation.input.active_swap, 200 * MB);
        assert_eq!(allocation.inactive_app_limit, 1300 * MB);
    }

    #[test]
    fn test_apps_by_seq() {
        let (mut d, _, _) = setup(config());
        let a = d.register_app("editor.desktop", None).unwrap();
        let b = d.register_app("term.desktop", None).unwrap();
        d.track_app(a);
        d.track_app(b);

        let apps = d.apps_by_seq();
        assert_eq!(apps.get(&1).map(String::as_str), Some("editor.desktop"));
        assert_eq!(apps.get(&2).map(String::as_str), Some("term.desktop"));
        assert!(!d.mark_ended(AppId::new(9)));
    }

    #[test]
    fn test_focus_finds_app_before_first_pass() {
        let (mut d, groups, _) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        assert_eq!(d.rebalance_count(), 0);

        assert_eq!(d.on_focus_changed(100, 1), FocusOutcome::Switched(a));
        assert_eq!(d.active_app().unwrap().id(), a);
        assert_eq!(d.rebalance_count(), 1);
    }

    #[test]
    fn test_stopped_dispatcher_writes_nothing() {
        let (mut d, groups, _) = setup(config());
        let a = launch(&mut d, &groups, &[100], 500 * MB);
        launch(&mut d, &groups, &[200], 150 * MB);
        d.rebalance();
        d.on_focus_changed(100, 1);
        assert!(groups.soft_limit(&group_of(a)).is_some());

        d.stop();
        assert!(d.is_stopped());
        assert_eq!(groups.soft_limit(&GroupPath::new(ROOT)), None);
        assert_eq!(groups.soft_limit(&group_of(a)), None);

        let passes = d.rebalance_count();
        groups.clear_events();
        assert_eq!(d.on_focus_changed(200, 2), FocusOutcome::Stopped);
        assert!(d.rebalance().is_none());

        assert_eq!(d.rebalance_count(), passes);
        assert_eq!(d.active_app().unwrap().id(), a);
        assert!(groups.events().is_empty());
        assert_eq!(groups.soft_limit(&group_of(a)), None);
    }
}
