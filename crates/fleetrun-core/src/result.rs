//! Per-host dispatch results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::HostStatus;

/// What happened on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Host identifier as it appears in the HostSet.
    pub host: String,

    /// Outcome classification.
    pub status: HostStatus,

    /// Exit code of the transport process, if it exited normally.
    pub exit_code: Option<i32>,

    /// Captured output (remote stdout and stderr merged).
    pub output: String,

    /// File the output was captured to, if any.
    pub output_path: Option<PathBuf>,

    /// Transport level error, if the command could not be run at all.
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DispatchResult {
    /// Create a result for a host whose command ran to completion.
    pub fn completed(host: impl Into<String>, exit_code: i32, output: impl Into<String>) -> Self {
        let status = if exit_code == 0 {
            HostStatus::Success
        } else {
            HostStatus::Failed
        };
        Self::with_status(host, status, Some(exit_code), output.into(), None)
    }

    /// Create a result for a host that could not be reached.
    pub fn unreachable(host: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_status(host, HostStatus::Unreachable, None, String::new(), Some(error.into()))
    }

    /// Create a result for a host whose worker was cancelled.
    pub fn cancelled(host: impl Into<String>) -> Self {
        Self::with_status(host, HostStatus::Cancelled, None, String::new(), None)
    }

    fn with_status(
        host: impl Into<String>,
        status: HostStatus,
        exit_code: Option<i32>,
        output: String,
        error: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            host: host.into(),
            status,
            exit_code,
            output,
            output_path: None,
            error,
            started_at: now,
            finished_at: now,
        }
    }

    /// Builder method to record where output was captured.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Builder method to set the start time.
    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self
    }

    /// Override the status, e.g. when the exit code means "connection failed".
    pub fn with_status_override(mut self, status: HostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Elapsed wall time in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// All results of one run, keyed by host.
///
/// Iteration is sorted by host name regardless of completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    results: BTreeMap<String, DispatchResult>,

    /// True when the run was interrupted before every host finished.
    pub cancelled: bool,
}

impl DispatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Returns false if the host already had one.
    pub fn insert(&mut self, result: DispatchResult) -> bool {
        if self.results.contains_key(&result.host) {
            return false;
        }
        self.results.insert(result.host.clone(), result);
        true
    }

    pub fn get(&self, host: &str) -> Option<&DispatchResult> {
        self.results.get(host)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results sorted by host name.
    pub fn iter(&self) -> impl Iterator<Item = &DispatchResult> {
        self.results.values()
    }

    pub fn succeeded(&self) -> usize {
        self.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Point output paths under `from` at the same files under `to`.
    ///
    /// Used after the directory holding captured output has been moved.
    pub fn rebase_output_paths(&mut self, from: &Path, to: &Path) {
        for result in self.results.values_mut() {
            let moved = result
                .output_path
                .as_deref()
                .and_then(|p| p.strip_prefix(from).ok())
                .map(|rel| to.join(rel));
            if moved.is_some() {
                result.output_path = moved;
            }
        }
    }
}
