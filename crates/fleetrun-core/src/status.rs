//! Status enums for hosts and runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

/// Outcome of dispatching to a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostStatus {
    /// Remote command exited with status 0.
    Success,
    /// Remote command ran and exited non-zero.
    Failed,
    /// Could not connect, authenticate or spawn the transport.
    Unreachable,
    /// Worker was stopped by cancellation before the command finished.
    Cancelled,
}

impl HostStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Label used in progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILURE",
            Self::Unreachable => "UNREACHABLE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle phase of a whole run.
///
/// `Running -> Exited` is the normal path. On a signal the run goes
/// `Running -> Interrupted -> Cleaning -> Exited`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    #[default]
    Running,
    Interrupted,
    Cleaning,
    Exited,
}

impl RunPhase {
    /// Validate a transition and return the new phase.
    pub fn transition(self, to: RunPhase) -> Result<RunPhase, CoreError> {
        let allowed = matches!(
            (self, to),
            (Self::Running, Self::Interrupted)
                | (Self::Running, Self::Cleaning)
                | (Self::Interrupted, Self::Cleaning)
                | (Self::Cleaning, Self::Exited)
        );
        if allowed {
            Ok(to)
        } else {
            Err(CoreError::InvalidPhaseTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", to),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited)
    }
}
