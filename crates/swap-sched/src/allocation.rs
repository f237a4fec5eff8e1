//! Memory budget split between the active app and the background apps.
//!
//! ```text
//! ui_apps_limit      = free + active_rss + inactive_rss
//! active_app_limit   = 0                                   if active_rss == 0
//!                    = max(active_rss + reserve, ui_apps_limit - reserve)
//! active_memory      = active_rss + active_swap
//! inactive_app_limit = min(ui_apps_limit - active_memory, free - active_memory)
//! ```
//!
//! The inactive limit is one value applied to every background app, not a
//! per-app share.

use std::fmt;
use swap_memory::MB;

/// Default margin kept back from the active app
pub const DEFAULT_ACTIVE_RESERVE: u64 = 100 * MB;

/// Figures a pass is computed from (bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationInput {
    /// Memory available before swapping
    pub free_memory: u64,
    /// Usage of the active app (0 when there is none)
    pub active_rss: u64,
    /// Swap used by the active app's processes
    pub active_swap: u64,
    /// Summed usage of every live inactive app
    pub inactive_rss: u64,
    /// Margin kept back from the active app
    pub reserve: u64,
}

/// Limits for one pass (bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Inputs the limits were derived from
    pub input: AllocationInput,
    /// Soft limit of the root apps group
    pub ui_apps_limit: u64,
    /// Soft limit of the active app
    pub active_app_limit: u64,
    /// Soft limit of each inactive app
    pub inactive_app_limit: u64,
}

impl Allocation {
    /// Compute the limits. Subtractions saturate at zero.
    pub fn compute(input: AllocationInput) -> Self {
        let AllocationInput {
            free_memory,
            active_rss,
            active_swap,
            inactive_rss,
            reserve,
        } = input;

        let ui_apps_limit = free_memory
            .saturating_add(active_rss)
            .saturating_add(inactive_rss);

        let active_app_limit = if active_rss == 0 {
            0
        } else {
            active_rss
                .saturating_add(reserve)
                .max(ui_apps_limit.saturating_sub(reserve))
        };

        let active_memory = active_rss.saturating_add(active_swap);
        let inactive_app_limit = ui_apps_limit
            .saturating_sub(active_memory)
            .min(free_memory.saturating_sub(active_memory));

        Self {
            input,
            ui_apps_limit,
            active_app_limit,
            inactive_app_limit,
        }
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = &self.input;
        write!(
            f,
            "free {}MB, UI limit {}MB, active limit {}MB (uses {}MB + {}MB swap), \
             inactive limit {}MB (inactive apps use {}MB)",
            i.free_memory / MB,
            self.ui_apps_limit / MB,
            self.active_app_limit / MB,
            i.active_rss / MB,
            i.active_swap / MB,
            self.inactive_app_limit / MB,
            i.inactive_rss / MB,
        )
    }
}
