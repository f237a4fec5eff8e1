//! Periodic worker and the shared handle collaborators call into.
//!
//! Focus notifications, launcher callbacks and periodic passes all go
//! through one lock on the [`Dispatcher`], so passes never interleave.

use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::allocation::Allocation;
use crate::app::AppRecord;
use crate::dispatch::{Dispatcher, SchedError};
use crate::message::{AppId, FocusOutcome, WorkerMessage};

/// Cloneable, thread-safe access to a [`Dispatcher`].
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<Mutex<Dispatcher>>,
}

impl SchedulerHandle {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dispatcher)),
        }
    }

    /// Lock the dispatcher. A pass that panicked leaves the state usable,
    /// so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Dispatcher> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the dispatcher locked.
    pub fn with<R>(&self, f: impl FnOnce(&Dispatcher) -> R) -> R {
        f(&self.lock())
    }

    pub fn register_app(&self, label: &str, hard_limit: Option<u64>) -> Result<AppRecord, SchedError> {
        self.lock().register_app(label, hard_limit)
    }

    pub fn track_app(&self, app: AppRecord) -> AppId {
        self.lock().track_app(app)
    }

    pub fn mark_ended(&self, id: AppId) -> bool {
        self.lock().mark_ended(id)
    }

    pub fn on_focus_changed(&self, pid: u32, window_id: u64) -> FocusOutcome {
        self.lock().on_focus_changed(pid, window_id)
    }

    pub fn rebalance(&self) -> Option<Allocation> {
        self.lock().rebalance()
    }

    pub fn cancel_limits(&self) {
        self.lock().cancel_limits()
    }

    /// Remove every soft limit and turn later calls into no-ops.
    pub fn stop(&self) {
        self.lock().stop()
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().is_stopped()
    }

    pub fn apps_by_seq(&self) -> BTreeMap<u32, String> {
        self.lock().apps_by_seq()
    }

    pub fn rebalance_count(&self) -> u64 {
        self.lock().rebalance_count()
    }

    /// Worker loop: a pass per tick, or on request, until shut down.
    pub fn run_periodic(&self, interval: Duration, rx: &Receiver<WorkerMessage>) {
        let ticker = tick(interval);
        loop {
            select! {
                recv(ticker) -> _ => self.run_pass(),
                recv(rx) -> msg => match msg {
                    Ok(WorkerMessage::RebalanceNow) => self.run_pass(),
                    Ok(WorkerMessage::Shutdown) => {
                        debug!("Worker received shutdown");
                        break;
                    }
                    Err(_) => {
                        debug!("Worker channel closed, shutting down");
                        break;
                    }
                },
            }
        }
    }

    /// One pass inside a panic isolation boundary.
    ///
    /// Only effective with unwinding panics. The release profile builds with
    /// `panic = "abort"`, where a panicking pass ends the process instead.
    fn run_pass(&self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.rebalance()));

        if let Err(panic_info) = result {
            let error_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Rebalance pass panicked: {}", error_msg);
        }
    }
}

/// Running scheduler: the periodic worker plus its handle.
///
/// Dropping it stops the worker and removes every soft limit, same as
/// [`Scheduler::shutdown`].
pub struct Scheduler {
    handle: SchedulerHandle,
    tx: Sender<WorkerMessage>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the periodic worker.
    pub fn start(handle: SchedulerHandle, interval: Duration) -> Result<Self, SchedError> {
        let (tx, rx) = unbounded();

        let worker_handle = handle.clone();
        let worker = thread::Builder::new()
            .name("swapsched-worker".to_string())
            .spawn(move || {
                info!("Scheduler worker started ({:?} period)", interval);
                worker_handle.run_periodic(interval, &rx);
                info!("Scheduler worker stopped");
            })
            .map_err(SchedError::Spawn)?;

        Ok(Self {
            handle,
            tx,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    /// Ask the worker for a pass without waiting for the next tick.
    pub fn rebalance_now(&self) -> bool {
        self.tx.send(WorkerMessage::RebalanceNow).is_ok()
    }

    /// Stop the worker and remove every soft limit.
    ///
    /// Cloned handles stay usable afterwards, but their focus changes and
    /// passes no longer write limits.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = self.tx.send(WorkerMessage::Shutdown);
        if worker.join().is_err() {
            warn!("Scheduler worker exited abnormally");
        }

        self.handle.stop();
        info!("Scheduler stopped, limits cancelled");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
