//! Identifiers and messages exchanged with collaborators.

use std::fmt;

/// Sequence number identifying a tracked application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub u32);

impl AppId {
    /// Create a new app ID.
    pub fn new(seq: u32) -> Self {
        Self(seq)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "App({})", self.0)
    }
}

/// What a focus-change notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Same window as the previous notification
    Unchanged,
    /// No owning process reported (pid 0); active app kept
    Ignored,
    /// The pid belongs to no tracked app; active app kept
    NotTracked,
    /// The pid already belongs to the active app
    AlreadyActive,
    /// Roles were swapped and a rebalance ran
    Switched(AppId),
    /// The scheduler was shut down; nothing changed
    Stopped,
}

/// Messages sent to the periodic worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Run a pass now instead of waiting for the next tick
    RebalanceNow,
    /// Stop the worker loop
    Shutdown,
}
