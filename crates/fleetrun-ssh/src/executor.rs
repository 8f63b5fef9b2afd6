//! OpenSSH client executor.
//!
//! This module provides [`OpenSshTransport`], which runs one remote command
//! per `ssh` child process in non-interactive batch mode.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use fleetrun_core::RemoteCommand;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{ExecOutcome, Transport};

/// Exit status OpenSSH uses when the connection itself failed.
pub const CONNECTION_FAILED_EXIT: i32 = 255;

/// Remote prefix merging the command's stderr into stdout before capture.
const MERGE_STDERR: &str = "exec 2>&1; ";

/// Transport backed by the system OpenSSH client.
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    /// Path to the ssh executable.
    ssh_path: String,

    /// Client config passed with `-F` (optional).
    config_file: Option<PathBuf>,

    /// `ConnectTimeout` in seconds (optional).
    connect_timeout_secs: Option<u64>,

    /// Pass `-v` to ssh.
    verbose: bool,

    /// Additional `-o key=value` options.
    options: Vec<(String, String)>,
}

impl OpenSshTransport {
    /// Create a new transport with the given path to ssh.
    ///
    /// The path can be just "ssh" to use PATH lookup, or a full path.
    pub fn new(ssh_path: impl Into<String>) -> Self {
        Self {
            ssh_path: ssh_path.into(),
            config_file: None,
            connect_timeout_secs: None,
            verbose: false,
            options: Vec::new(),
        }
    }

    /// Set the client config file.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Enable ssh's own debug output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Add an `-o key=value` option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Arguments passed to ssh for `host`, without the program name.
    ///
    /// Host key checking and password authentication are always disabled:
    /// runs are unattended, so a prompt would hang the worker.
    pub fn args(&self, host: &str, command: &RemoteCommand) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(config) = &self.config_file {
            args.push("-F".to_string());
            args.push(config.display().to_string());
        }

        let mut options = vec![
            ("StrictHostKeyChecking".to_string(), "no".to_string()),
            ("PasswordAuthentication".to_string(), "no".to_string()),
            ("BatchMode".to_string(), "yes".to_string()),
        ];
        if let Some(secs) = self.connect_timeout_secs {
            options.push(("ConnectTimeout".to_string(), secs.to_string()));
        }
        if !self.verbose {
            options.push(("LogLevel".to_string(), "ERROR".to_string()));
        }
        options.extend(self.options.iter().cloned());

        for (key, value) in options {
            args.push("-o".to_string());
            args.push(format!("{}={}", key, value));
        }

        if self.verbose {
            args.push("-v".to_string());
        }

        args.push("-T".to_string());
        // Host names come from files; one starting with `-` must not parse as an option.
        args.push("--".to_string());
        args.push(host.to_string());
        args.push(format!("{}{}", MERGE_STDERR, command.render()));
        args
    }

    /// Build the child process for `host`, capturing all output to `output`.
    fn build_command(
        &self,
        host: &str,
        command: &RemoteCommand,
        output: &Path,
    ) -> Result<Command, TransportError> {
        let capture_err = |source| TransportError::Capture {
            path: output.display().to_string(),
            source,
        };
        let stdout = File::create(output).map_err(capture_err)?;
        let stderr = stdout.try_clone().map_err(capture_err)?;

        let mut cmd = Command::new(&self.ssh_path);
        cmd.args(self.args(host, command))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            // A dropped worker future must never leave ssh running.
            .kill_on_drop(true);

        // Own process group: a terminal ^C reaches fleetrun only, and the
        // cancellation path decides when ssh dies.
        #[cfg(unix)]
        cmd.process_group(0);

        Ok(cmd)
    }
}

impl Default for OpenSshTransport {
    fn default() -> Self {
        Self::new("ssh")
    }
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn execute(
        &self,
        host: &str,
        command: &RemoteCommand,
        output_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecOutcome, TransportError> {
        if cancel.is_cancelled() {
            return Ok(ExecOutcome::Cancelled);
        }

        let mut cmd = self.build_command(host, command, output_path)?;
        debug!(host = %host, command = ?cmd, "Spawning ssh");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                TransportError::SshNotFound(self.ssh_path.clone())
            } else {
                TransportError::SpawnError(e)
            }
        })?;

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                // SIGKILL, then reap so the process is gone when we return.
                if let Err(e) = child.kill().await {
                    warn!(host = %host, error = %e, "Failed to kill ssh process");
                }
                info!(host = %host, "ssh process killed on cancellation");
                return Ok(ExecOutcome::Cancelled);
            }
        };

        let bytes = tokio::fs::read(output_path)
            .await
            .map_err(|source| TransportError::Capture {
                path: output_path.display().to_string(),
                source,
            })?;
        let output = String::from_utf8_lossy(&bytes).into_owned();

        debug!(host = %host, exit_code = ?status.code(), output_len = output.len(), "ssh exited");

        Ok(ExecOutcome::Exited {
            exit_code: status.code(),
            output,
        })
    }
}
