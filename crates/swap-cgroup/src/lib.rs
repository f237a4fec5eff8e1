//! swapsched resource groups
//!
//! Wraps the cgroup-v1 `memory` and `freezer` hierarchies used to account
//! and limit each tracked application.
//!
//! # Layout
//!
//! ```text
//! <mount>/memory/<apps group>/<seq>/memory.soft_limit_in_bytes
//! <mount>/freezer/<apps group>/<seq>/freezer.state
//! ```
//!
//! Every operation is keyed by a [`GroupPath`] relative to the controller
//! directory, so one [`GroupController`] serves the root group and all of
//! its children.

mod controller;
mod freeze;
mod fs;
mod path;

pub use controller::{CgroupError, CgroupResult, GroupController};
pub use freeze::FreezeGuard;
pub use fs::{CgroupFs, DEFAULT_MOUNT};
pub use path::{Controller, GroupPath};
