//! Run configuration.

use std::path::{Path, PathBuf};

use fleetrun_core::RunId;

/// Environment variable overriding the fleetrun home directory.
pub const HOME_ENV: &str = "FLEETRUN_HOME";

/// Configuration for one invocation, built once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Identifier of this run.
    pub run_id: RunId,

    /// Directory holding the inventory, selection, ssh config and logs.
    pub home: PathBuf,

    /// Parent directory for per-run workspaces.
    pub workspace_root: PathBuf,

    /// ssh config override. `None` means the generated `<home>/ssh_config`.
    pub ssh_config: Option<PathBuf>,

    /// ssh executable.
    pub ssh_path: String,

    /// Keep the workspace under `<home>/logs/<run_id>` instead of deleting it.
    pub retain_logs: bool,

    /// Use the existing ssh config as-is instead of regenerating it.
    pub use_cache: bool,

    /// Suppress the per-host progress line.
    pub quiet: bool,

    /// Pass `-v` to ssh.
    pub debug: bool,

    /// Upper bound on concurrent workers. `None` means one per host.
    pub max_parallel: Option<usize>,

    /// ssh `ConnectTimeout` in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: RunId::generate(),
            home: default_home(),
            workspace_root: std::env::temp_dir(),
            ssh_config: None,
            ssh_path: "ssh".to_string(),
            retain_logs: false,
            use_cache: false,
            quiet: false,
            debug: false,
            max_parallel: None,
            connect_timeout_secs: 10,
        }
    }
}

impl RunConfig {
    /// Instance inventory file.
    pub fn inventory_path(&self) -> PathBuf {
        self.home.join("instances.json")
    }

    /// Default saved selection, used when no selector is given.
    pub fn selection_path(&self) -> PathBuf {
        self.home.join("selection")
    }

    /// Root under which retained workspaces are archived.
    pub fn logs_root(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Location of the generated ssh config.
    pub fn generated_ssh_config(&self) -> PathBuf {
        self.home.join("ssh_config")
    }

    /// ssh config the run snapshots.
    pub fn ssh_config_source(&self) -> PathBuf {
        self.ssh_config
            .clone()
            .unwrap_or_else(|| self.generated_ssh_config())
    }

    /// Number of concurrent workers for `host_count` hosts.
    pub fn width(&self, host_count: usize) -> usize {
        let width = match self.max_parallel {
            Some(max) if max > 0 => max.min(host_count),
            _ => host_count,
        };
        width.max(1)
    }
}

/// `$FLEETRUN_HOME`, else `~/.fleetrun`, else `./.fleetrun`.
pub fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(".fleetrun")
}
