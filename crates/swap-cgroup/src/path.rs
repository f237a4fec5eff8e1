//! Group paths and controller names.

use std::fmt;

/// A cgroup-v1 controller the scheduler relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Controller {
    /// Memory accounting and soft/hard limits
    Memory,
    /// Freeze/thaw of member processes
    Freezer,
}

impl Controller {
    /// Every controller a tracked group is created under.
    pub const ALL: [Controller; 2] = [Controller::Memory, Controller::Freezer];

    /// Directory name of the hierarchy under the cgroup mount.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Freezer => "freezer",
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slash-separated group path relative to a controller directory,
/// e.g. `c2@dde/uiapps/3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupPath(String);

impl GroupPath {
    /// Create a path, dropping leading, trailing and repeated slashes.
    pub fn new(path: impl AsRef<str>) -> Self {
        let parts: Vec<&str> = path
            .as_ref()
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        Self(parts.join("/"))
    }

    /// Path of a direct child group.
    pub fn child(&self, name: impl fmt::Display) -> Self {
        if self.0.is_empty() {
            Self::new(name.to_string())
        } else {
            Self::new(format!("{}/{}", self.0, name))
        }
    }

    /// Path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the controller root itself.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
