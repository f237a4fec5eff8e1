//! Starts configured applications inside their own group.

use anyhow::{bail, Result};
use std::process::{Child, Command};
use std::thread;
use swap_sched::{AppId, SchedulerHandle};
use tracing::{debug, info, warn};

use crate::config::AppEntry;

/// Tool that runs a command inside a given cgroup
const CGEXEC: &str = "cgexec";

/// Build the command placing `argv` in `group` under both hierarchies.
fn cgexec_command(group: &str, argv: &[String]) -> Command {
    let mut cmd = Command::new(CGEXEC);
    cmd.arg("-g").arg(format!("memory,freezer:{}", group)).args(argv);
    cmd
}

/// Register, spawn and track one application.
///
/// The primary process is waited on in a background thread; its exit marks
/// the app ended. A failed spawn still tracks the app and marks it ended at
/// once, so its empty group is reclaimed by the next pass.
pub fn launch(handle: &SchedulerHandle, entry: &AppEntry) -> Result<AppId> {
    if entry.command.is_empty() {
        bail!("App {} has an empty command", entry.label);
    }

    let app = handle.register_app(&entry.label, entry.hard_limit)?;
    let child = cgexec_command(app.group().as_str(), &entry.command).spawn();
    let group = app.group().clone();
    let id = handle.track_app(app);

    match child {
        Ok(child) => {
            info!("Launched {} as {} (pid {}) in {}", entry.label, id, child.id(), group);
            watch(handle.clone(), id, child);
        }
        Err(e) => {
            warn!("Failed to launch {}: {}", entry.label, e);
            handle.mark_ended(id);
        }
    }

    Ok(id)
}

fn watch(handle: SchedulerHandle, id: AppId, mut child: Child) {
    let waiter = handle.clone();
    let spawned = thread::Builder::new()
        .name(format!("swapsched-wait-{}", id.0))
        .spawn(move || {
            match child.wait() {
                Ok(status) => debug!("{} exited: {}", id, status),
                Err(e) => warn!("Failed to wait for {}: {}", id, e),
            }
            waiter.mark_ended(id);
        });

    if let Err(e) = spawned {
        warn!("Cannot watch {}: {}", id, e);
        handle.mark_ended(id);
    }
}
