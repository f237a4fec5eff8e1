//! Scoped freeze/thaw bracket.
//!
//! Limit writes made while member processes are frozen appear atomic to
//! them. The guard thaws on drop, so every exit path out of a pass
//! (early return, failed write, panic) releases the groups.

use tracing::warn;

use crate::controller::GroupController;
use crate::path::GroupPath;

/// Groups frozen for the lifetime of the guard.
///
/// # Usage
///
/// ```rust,ignore
/// let _frozen = FreezeGuard::freeze(&ctl, &groups);
/// ctl.set_soft_limit(&group, limit)?; // thawed even if this fails
/// ```
pub struct FreezeGuard<'a> {
    ctl: &'a dyn GroupController,
    frozen: Vec<GroupPath>,
}

impl<'a> FreezeGuard<'a> {
    /// Freeze every group in `paths`.
    ///
    /// A group that fails to freeze is logged and left out; it will not be
    /// thawed either.
    pub fn freeze<'p, I>(ctl: &'a dyn GroupController, paths: I) -> Self
    where
        I: IntoIterator<Item = &'p GroupPath>,
    {
        let mut frozen = Vec::new();
        for path in paths {
            match ctl.freeze(path) {
                Ok(()) => frozen.push(path.clone()),
                Err(e) => warn!("Failed to freeze {}: {}", path, e),
            }
        }
        Self { ctl, frozen }
    }

    /// Groups currently held frozen.
    pub fn frozen(&self) -> &[GroupPath] {
        &self.frozen
    }
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        for path in self.frozen.iter().rev() {
            if let Err(e) = self.ctl.thaw(path) {
                warn!("Failed to thaw {}: {}", path, e);
            }
        }
    }
}
