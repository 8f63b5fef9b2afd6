//! Newtype wrapper for the run identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for one invocation.
///
/// Derived from the start time plus the process id, so two runs started in
/// the same second from different processes still get distinct workspaces.
/// The value only contains `[0-9a-z-]`, which keeps it usable as a directory
/// name and as a tmux session name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new RunId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate the RunId for the current process.
    pub fn generate() -> Self {
        Self::from_parts(Utc::now(), std::process::id())
    }

    /// Build a RunId from an explicit start time and process id.
    pub fn from_parts(started_at: DateTime<Utc>, pid: u32) -> Self {
        Self(format!("{}-{}", started_at.format("%Y%m%d-%H%M%S"), pid))
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
