//! swapsched core
//!
//! Partitions the memory a desktop session may use between the focused
//! ("active") application and every background ("inactive") one by writing
//! cgroup soft limits. Background apps are pushed toward reclaim first so the
//! foreground app stays responsive under pressure.
//!
//! - [`Dispatcher`] owns the tracked apps and computes each pass
//! - [`SchedulerHandle`] serializes focus events and periodic passes on one lock
//! - [`Scheduler`] runs the periodic worker and stops it on shutdown

mod allocation;
mod app;
mod config;
mod dispatch;
mod message;
mod scheduler;

#[cfg(test)]
mod testing;

pub use allocation::{Allocation, AllocationInput, DEFAULT_ACTIVE_RESERVE};
pub use app::{AppRecord, AppState};
pub use config::{ActivationConfig, ConfigError, DesktopGroupConfig, SchedConfig};
pub use dispatch::{Dispatcher, SchedError};
pub use message::{AppId, FocusOutcome, WorkerMessage};
pub use scheduler::{Scheduler, SchedulerHandle};
