//! In-memory group controller and memory reader for tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use swap_cgroup::{CgroupError, CgroupResult, Controller, GroupController, GroupPath};
use swap_memory::{MemoryStatReader, SystemMemorySnapshot};

#[derive(Default)]
struct GroupState {
    pids: BTreeSet<u32>,
    usage: u64,
    hard_limit: Option<u64>,
    frozen: bool,
}

#[derive(Default)]
struct Inner {
    provisioned: HashSet<(GroupPath, Controller)>,
    groups: HashMap<GroupPath, GroupState>,
    soft_limits: HashMap<GroupPath, u64>,
    failing: HashSet<GroupPath>,
    unreadable: HashSet<GroupPath>,
    deletes: HashMap<GroupPath, usize>,
    events: Vec<String>,
}

/// Shared fake; clones observe the same state.
#[derive(Clone, Default)]
pub struct FakeGroups {
    inner: Arc<Mutex<Inner>>,
}

fn not_found(path: &GroupPath) -> CgroupError {
    CgroupError::Io {
        path: path.as_str().into(),
        source: io::Error::from(io::ErrorKind::NotFound),
    }
}

impl FakeGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake with `root` pre-provisioned under both hierarchies.
    pub fn with_root(root: &str) -> Self {
        let groups = Self::new();
        groups.provision(root, &Controller::ALL);
        groups
    }

    pub fn provision(&self, path: &str, controllers: &[Controller]) {
        let mut inner = self.inner.lock().unwrap();
        for controller in controllers {
            inner.provisioned.insert((GroupPath::new(path), *controller));
        }
    }

    pub fn set_members(&self, path: &GroupPath, pids: &[u32], usage: u64) {
        let mut inner = self.inner.lock().unwrap();
        let group = inner.groups.get_mut(path).expect("group exists");
        group.pids = pids.iter().copied().collect();
        group.usage = usage;
    }

    pub fn fail_writes(&self, path: &GroupPath) {
        self.inner.lock().unwrap().failing.insert(path.clone());
    }

    /// Make member listing fail with a permission error.
    pub fn fail_reads(&self, path: &GroupPath) {
        self.inner.lock().unwrap().unreadable.insert(path.clone());
    }

    pub fn soft_limit(&self, path: &GroupPath) -> Option<u64> {
        self.inner.lock().unwrap().soft_limits.get(path).copied()
    }

    pub fn hard_limit(&self, path: &GroupPath) -> Option<u64> {
        self.inner
            .lock()
            .unwrap()
            .groups
            .get(path)
            .and_then(|g| g.hard_limit)
    }

    pub fn exists_group(&self, path: &GroupPath) -> bool {
        self.inner.lock().unwrap().groups.contains_key(path)
    }

    pub fn delete_count(&self, path: &GroupPath) -> usize {
        self.inner
            .lock()
            .unwrap()
            .deletes
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn any_frozen(&self) -> bool {
        self.inner.lock().unwrap().groups.values().any(|g| g.frozen)
    }

    /// Freeze, thaw and soft-limit writes in call order.
    pub fn events(&self) -> Vec<String> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.inner.lock().unwrap().events.clear();
    }

    fn known(inner: &Inner, path: &GroupPath) -> bool {
        inner.groups.contains_key(path)
            || inner
                .provisioned
                .contains(&(path.clone(), Controller::Memory))
    }
}

impl GroupController for FakeGroups {
    fn exists(&self, path: &GroupPath, controller: Controller) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.groups.contains_key(path) || inner.provisioned.contains(&(path.clone(), controller))
    }

    fn create(&self, path: &GroupPath) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.groups.entry(path.clone()).or_default();
        Ok(())
    }

    fn delete(&self, path: &GroupPath) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.groups.remove(path);
        inner.soft_limits.remove(path);
        *inner.deletes.entry(path.clone()).or_default() += 1;
        Ok(())
    }

    fn list_pids(&self, path: &GroupPath) -> CgroupResult<BTreeSet<u32>> {
        let inner = self.inner.lock().unwrap();
        if inner.unreadable.contains(path) {
            return Err(CgroupError::Io {
                path: path.as_str().into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        Ok(inner
            .groups
            .get(path)
            .map(|g| g.pids.clone())
            .unwrap_or_default())
    }

    fn aggregate_usage(&self, path: &GroupPath) -> CgroupResult<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .groups
            .get(path)
            .map(|g| g.usage)
            .ok_or_else(|| not_found(path))
    }

    fn set_soft_limit(&self, path: &GroupPath, bytes: u64) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(path) || !Self::known(&inner, path) {
            return Err(not_found(path));
        }
        inner.events.push(format!("soft {} {}", path, bytes));
        inner.soft_limits.insert(path.clone(), bytes);
        Ok(())
    }

    fn cancel_soft_limit(&self, path: &GroupPath) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(path) || !Self::known(&inner, path) {
            return Err(not_found(path));
        }
        inner.events.push(format!("cancel {}", path));
        inner.soft_limits.remove(path);
        Ok(())
    }

    fn set_hard_limit(&self, path: &GroupPath, bytes: u64) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(path) {
            return Err(not_found(path));
        }
        let group = inner.groups.get_mut(path).ok_or_else(|| not_found(path))?;
        group.hard_limit = Some(bytes);
        Ok(())
    }

    fn freeze(&self, path: &GroupPath) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let group = inner.groups.get_mut(path).ok_or_else(|| not_found(path))?;
        group.frozen = true;
        inner.events.push(format!("freeze {}", path));
        Ok(())
    }

    fn thaw(&self, path: &GroupPath) -> CgroupResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(group) = inner.groups.get_mut(path) {
            group.frozen = false;
        }
        inner.events.push(format!("thaw {}", path));
        Ok(())
    }
}

/// Memory reader returning preset figures.
#[derive(Clone, Default)]
pub struct FakeMemory {
    snapshot: Arc<Mutex<SystemMemorySnapshot>>,
    swap: Arc<Mutex<HashMap<u32, u64>>>,
}

impl FakeMemory {
    pub fn new(snapshot: SystemMemorySnapshot) -> Self {
        let memory = Self::default();
        memory.set_snapshot(snapshot);
        memory
    }

    pub fn set_snapshot(&self, snapshot: SystemMemorySnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_free(&self, free_memory: u64) {
        self.snapshot.lock().unwrap().free_memory = free_memory;
    }

    pub fn set_swap(&self, pid: u32, bytes: u64) {
        self.swap.lock().unwrap().insert(pid, bytes);
    }
}

impl MemoryStatReader for FakeMemory {
    fn system_snapshot(&self) -> SystemMemorySnapshot {
        *self.snapshot.lock().unwrap()
    }

    fn process_swap(&self, pids: &[u32]) -> u64 {
        let swap = self.swap.lock().unwrap();
        pids.iter().filter_map(|pid| swap.get(pid)).sum()
    }
}
