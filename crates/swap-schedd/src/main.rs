//! swap-schedd: memory-pressure-aware application scheduler daemon
//!
//! Loads the configuration, launches the configured apps in their own
//! groups, follows focus changes from stdin and rebalances soft limits
//! until interrupted.

mod config;
mod focus;
mod launcher;

use anyhow::{Context, Result};
use std::io::{self, BufReader};
use std::sync::Arc;
use swap_cgroup::CgroupFs;
use swap_memory::{format_bytes, MemoryStatReader, ProcMemoryReader};
use swap_sched::{Dispatcher, Scheduler, SchedulerHandle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{config_path, DaemonConfig};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = match config_path(std::env::args().nth(1)) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            DaemonConfig::load(&path)?
        }
        None => {
            info!("No configuration given, using defaults");
            DaemonConfig::default()
        }
    };

    let ctl = Arc::new(CgroupFs::new(&config.sched.cgroup_mount));
    let reader = Arc::new(ProcMemoryReader::new(&config.sched.proc_root));
    let period = config.sched.sample_period();

    let memory = reader.system_snapshot();
    info!(
        "Memory: {} total, {} available, {} swap ({} used)",
        format_bytes(memory.total_memory),
        format_bytes(memory.free_memory),
        format_bytes(memory.swap_total),
        format_bytes(memory.used_swap),
    );

    let dispatcher = Dispatcher::new(config.sched.clone(), ctl, reader)
        .context("Cannot start scheduler")?;
    let handle = SchedulerHandle::new(dispatcher);
    let scheduler = Scheduler::start(handle.clone(), period)?;
    info!("swap-schedd started, rebalancing every {:?}", period);

    for entry in &config.apps {
        if let Err(e) = launcher::launch(&handle, entry) {
            warn!("Skipping {}: {:#}", entry.label, e);
        }
    }

    for (seq, label) in handle.apps_by_seq() {
        info!("Tracking app {}: {}", seq, label);
    }

    let _focus = focus::spawn_reader(handle.clone(), BufReader::new(io::stdin()))
        .context("Cannot start focus reader")?;

    tokio::signal::ctrl_c()
        .await
        .context("Cannot listen for interrupt")?;

    info!("Interrupted, shutting down");
    tokio::task::spawn_blocking(move || scheduler.shutdown()).await?;

    // The focus reader may still be blocked on stdin; it is not joined.

    Ok(())
}
