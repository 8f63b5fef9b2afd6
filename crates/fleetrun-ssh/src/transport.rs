//! The transport seam used by the dispatch engine.

use std::path::Path;

use async_trait::async_trait;
use fleetrun_core::RemoteCommand;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// How a single host's execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The transport process exited. `exit_code` is `None` when it was
    /// terminated by a signal.
    Exited {
        exit_code: Option<i32>,
        output: String,
    },
    /// The cancellation token fired; the child has been killed and reaped.
    Cancelled,
}

/// Runs one command on one host.
///
/// Implementations must return only after any process they started has
/// exited, including on cancellation, so callers can rely on "no orphaned
/// children" once every call has returned.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        host: &str,
        command: &RemoteCommand,
        output_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecOutcome, TransportError>;
}
