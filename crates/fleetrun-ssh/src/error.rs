//! Error types for the SSH transport.

use thiserror::Error;

/// Errors that prevent a command from being run on a host at all.
///
/// A remote command that runs and exits non-zero is not an error here; it is
/// reported through [`ExecOutcome`](crate::ExecOutcome).
#[derive(Debug, Error)]
pub enum TransportError {
    /// ssh executable not found.
    #[error("ssh client not found at '{0}'. Ensure OpenSSH is installed.")]
    SshNotFound(String),

    /// Failed to spawn the ssh process.
    #[error("Failed to spawn ssh process: {0}")]
    SpawnError(#[source] std::io::Error),

    /// Failed to create or read the output capture file.
    #[error("Output capture failed for '{path}': {source}")]
    Capture {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or killing the child process failed.
    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),
}
