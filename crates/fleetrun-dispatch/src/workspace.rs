//! Per-run workspace directory.
//!
//! Layout:
//!
//! ```text
//! fleetrun-<run_id>/
//!   hosts          one host per line
//!   commands.txt   the rendered remote command
//!   sshconfig      snapshot of the ssh config
//!   logs/<host>    captured output per host
//! ```
//!
//! The workspace is finalized exactly once: removed, or moved under the logs
//! root when retention was requested. Dropping an unfinalized workspace
//! finalizes it, so every exit path after creation cleans up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fleetrun_core::{HostSet, RemoteCommand, RunId};
use tracing::{debug, info, warn};

use crate::error::DispatchError;

pub const HOSTS_FILE: &str = "hosts";
pub const COMMAND_FILE: &str = "commands.txt";
pub const SSH_CONFIG_FILE: &str = "sshconfig";
pub const LOGS_DIR: &str = "logs";

/// What happens to the workspace when the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retention {
    /// Delete everything.
    Discard,
    /// Move the workspace to `<root>/<run_id>`.
    Archive(PathBuf),
}

/// An allocated run workspace.
#[derive(Debug)]
pub struct Workspace {
    run_id: RunId,
    path: PathBuf,
    retention: Retention,
    finalized: bool,
}

impl Workspace {
    /// Allocate `<root>/fleetrun-<run_id>` and write the run's inputs into it.
    ///
    /// Fails if the directory already exists. A partially written directory
    /// is removed before the error is returned.
    pub fn create(
        root: &Path,
        run_id: &RunId,
        hosts: &HostSet,
        command: &RemoteCommand,
        ssh_config: &Path,
        retention: Retention,
    ) -> Result<Self, DispatchError> {
        let path = root.join(format!("fleetrun-{}", run_id));
        let err = |source| DispatchError::Workspace {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(root).map_err(err)?;
        fs::create_dir(&path).map_err(err)?;

        let mut workspace = Self {
            run_id: run_id.clone(),
            path,
            retention,
            finalized: false,
        };

        if let Err(source) = workspace.populate(hosts, command, ssh_config) {
            workspace.finalized = true;
            workspace.discard();
            return Err(DispatchError::Workspace {
                path: workspace.path.clone(),
                source,
            });
        }

        info!(path = %workspace.path.display(), hosts = hosts.len(), "Created workspace");
        Ok(workspace)
    }

    fn populate(&self, hosts: &HostSet, command: &RemoteCommand, ssh_config: &Path) -> io::Result<()> {
        fs::write(self.hosts_file(), hosts.to_lines())?;
        fs::write(self.command_file(), format!("{}\n", command.render()))?;
        fs::copy(ssh_config, self.ssh_config_file())?;
        fs::create_dir(self.logs_dir())?;
        Ok(())
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hosts_file(&self) -> PathBuf {
        self.path.join(HOSTS_FILE)
    }

    pub fn command_file(&self) -> PathBuf {
        self.path.join(COMMAND_FILE)
    }

    pub fn ssh_config_file(&self) -> PathBuf {
        self.path.join(SSH_CONFIG_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.path.join(LOGS_DIR)
    }

    /// Where a host's output is captured.
    pub fn output_file(&self, host: &str) -> PathBuf {
        self.logs_dir().join(output_file_name(host))
    }

    /// Remove or archive the workspace. Returns the archive location when
    /// the workspace was retained.
    ///
    /// Failures are logged and otherwise ignored. Later calls do nothing.
    pub fn finalize(&mut self) -> Option<PathBuf> {
        if self.finalized {
            return None;
        }
        self.finalized = true;

        match self.retention.clone() {
            Retention::Discard => {
                self.discard();
                None
            }
            Retention::Archive(root) => self.archive(&root),
        }
    }

    fn discard(&self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed workspace"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove workspace"),
        }
    }

    fn archive(&self, root: &Path) -> Option<PathBuf> {
        let dest = root.join(self.run_id.as_str());
        let moved = fs::create_dir_all(root).and_then(|_| move_dir(&self.path, &dest));
        match moved {
            Ok(()) => {
                info!(path = %dest.display(), "Workspace retained");
                Some(dest)
            }
            Err(e) => {
                warn!(
                    from = %self.path.display(),
                    to = %dest.display(),
                    error = %e,
                    "Failed to retain workspace"
                );
                None
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.finalized {
            self.finalize();
        }
    }
}

/// File name for a host's output.
///
/// `%`, `/` and `\` are percent-encoded, as are the dots of `.` and `..`, so
/// distinct hosts always get distinct files inside `logs/`.
pub(crate) fn output_file_name(host: &str) -> String {
    if host == "." || host == ".." {
        return host.replace('.', "%2E");
    }
    let mut name = String::with_capacity(host.len());
    for c in host.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            c => name.push(c),
        }
    }
    name
}

/// Rename, falling back to copy-and-remove across filesystems.
fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_dir(from, to)?;
    fs::remove_dir_all(from)
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
        hosts: HostSet,
        command: RemoteCommand,
        ssh_config: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ssh_config = dir.path().join("ssh_config");
        fs::write(&ssh_config, "Host h1\n    HostName 10.0.0.1\n").unwrap();
        Fixture {
            hosts: HostSet::new(["h1", "h2"], "test").unwrap(),
            command: RemoteCommand::build("uptime", None),
            ssh_config,
            dir,
        }
    }

    fn create(f: &Fixture, retention: Retention) -> Workspace {
        Workspace::create(
            &f.dir.path().join("tmp"),
            &RunId::new("run-1"),
            &f.hosts,
            &f.command,
            &f.ssh_config,
            retention,
        )
        .unwrap()
    }

    #[test]
    fn test_create_writes_inputs() {
        let f = fixture();
        let ws = create(&f, Retention::Discard);

        assert_eq!(ws.path(), f.dir.path().join("tmp/fleetrun-run-1"));
        assert_eq!(fs::read_to_string(ws.hosts_file()).unwrap(), "h1\nh2\n");
        assert_eq!(fs::read_to_string(ws.command_file()).unwrap(), "uptime\n");
        assert_eq!(
            fs::read_to_string(ws.ssh_config_file()).unwrap(),
            "Host h1\n    HostName 10.0.0.1\n"
        );
        assert!(ws.logs_dir().is_dir());
    }

    #[test]
    fn test_snapshot_isolated_from_later_changes() {
        let f = fixture();
        let ws = create(&f, Retention::Discard);
        fs::write(&f.ssh_config, "Host changed\n").unwrap();
        assert!(fs::read_to_string(ws.ssh_config_file())
            .unwrap()
            .contains("Host h1"));
    }

    #[test]
    fn test_discard_leaves_no_trace() {
        let f = fixture();
        let logs_root = f.dir.path().join("logs");
        let mut ws = create(&f, Retention::Discard);
        let path = ws.path().to_path_buf();

        assert!(ws.finalize().is_none());
        assert!(!path.exists());
        assert!(!logs_root.join("run-1").exists());
    }

    #[test]
    fn test_archive_moves_workspace() {
        let f = fixture();
        let logs_root = f.dir.path().join("logs");
        let mut ws = create(&f, Retention::Archive(logs_root.clone()));
        fs::write(ws.output_file("h1"), "up 3 days\n").unwrap();
        let path = ws.path().to_path_buf();

        let dest = ws.finalize().unwrap();
        assert_eq!(dest, logs_root.join("run-1"));
        assert!(!path.exists());
        for name in [HOSTS_FILE, COMMAND_FILE, SSH_CONFIG_FILE] {
            assert!(dest.join(name).is_file(), "{} missing", name);
        }
        assert_eq!(
            fs::read_to_string(dest.join("logs/h1")).unwrap(),
            "up 3 days\n"
        );
    }

    #[test]
    fn test_finalize_once() {
        let f = fixture();
        let mut ws = create(&f, Retention::Archive(f.dir.path().join("logs")));
        assert!(ws.finalize().is_some());
        assert!(ws.finalize().is_none());
    }

    #[test]
    fn test_drop_finalizes() {
        let f = fixture();
        let path = {
            let ws = create(&f, Retention::Discard);
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_ssh_config_cleans_partial_dir() {
        let f = fixture();
        let root = f.dir.path().join("tmp");
        let err = Workspace::create(
            &root,
            &RunId::new("run-2"),
            &f.hosts,
            &f.command,
            &f.dir.path().join("missing"),
            Retention::Discard,
        )
        .unwrap_err();

        assert!(matches!(err, DispatchError::Workspace { .. }));
        assert!(!root.join("fleetrun-run-2").exists());
    }

    #[test]
    fn test_existing_workspace_is_error() {
        let f = fixture();
        let _first = create(&f, Retention::Discard);
        let second = Workspace::create(
            &f.dir.path().join("tmp"),
            &RunId::new("run-1"),
            &f.hosts,
            &f.command,
            &f.ssh_config,
            Retention::Discard,
        );
        assert!(matches!(second, Err(DispatchError::Workspace { .. })));
    }

    #[test]
    fn test_output_file_name_encoded() {
        assert_eq!(output_file_name("user@web1"), "user@web1");
        assert_eq!(output_file_name("a/b"), "a%2Fb");
        assert_eq!(output_file_name("a\\b"), "a%5Cb");
        assert_eq!(output_file_name(".."), "%2E%2E");
    }

    #[test]
    fn test_output_file_names_never_collide() {
        let hosts = ["a/b", "a_b", "a%2Fb", "a\\b", ".", "..", "%2E"];
        let names: std::collections::HashSet<String> =
            hosts.iter().map(|h| output_file_name(h)).collect();
        assert_eq!(names.len(), hosts.len());
    }
}
