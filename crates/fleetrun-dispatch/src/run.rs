//! One complete invocation: resolve, prepare, dispatch, clean up.

use std::path::PathBuf;
use std::sync::Arc;

use fleetrun_core::{DispatchReport, HostSet, RemoteCommand, SessionWrap};
use fleetrun_ssh::{OpenSshTransport, Transport};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cancel::CancellationController;
use crate::catalog::{InstanceCatalog, SelectionFile};
use crate::config::RunConfig;
use crate::engine::{DispatchEngine, DispatchEvent};
use crate::error::DispatchError;
use crate::resolver::HostResolver;
use crate::sshconfig::prepare_ssh_config;
use crate::workspace::{Retention, Workspace};

/// Exit status of a run that was interrupted.
pub const EXIT_CANCELLED: i32 = 130;

/// What the caller asked to run, and where.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Fleet prefix or host list path.
    pub selector: Option<String>,

    /// Single instance; replaces the selector's hosts.
    pub instance: Option<String>,

    /// Command text as typed.
    pub command_text: String,

    /// `Some(None)` wraps in tmux with the default session name.
    pub tmux: Option<Option<String>>,
}

/// Result of a run that got as far as dispatching.
#[derive(Debug)]
pub struct RunOutcome {
    pub hosts: HostSet,
    pub command: RemoteCommand,
    pub report: DispatchReport,
    /// Where the workspace was archived, when retained.
    pub archived_to: Option<PathBuf>,
}

impl RunOutcome {
    /// 0 once dispatch was attempted, regardless of per-host failures.
    pub fn exit_code(&self) -> i32 {
        if self.report.cancelled {
            EXIT_CANCELLED
        } else {
            0
        }
    }
}

/// The production transport: OpenSSH against the workspace's config snapshot.
pub fn openssh_transport(config: &RunConfig, workspace: &Workspace) -> Arc<dyn Transport> {
    Arc::new(
        OpenSshTransport::new(config.ssh_path.clone())
            .with_config_file(workspace.ssh_config_file())
            .with_connect_timeout(config.connect_timeout_secs)
            .with_verbose(config.debug),
    )
}

/// Execute one run.
///
/// Errors before the workspace exists leave nothing behind. Once it exists
/// the workspace is finalized on every path, including cancellation.
pub async fn execute_run<F>(
    config: &RunConfig,
    request: &RunRequest,
    catalog: &dyn InstanceCatalog,
    controller: &CancellationController,
    progress: Option<mpsc::UnboundedSender<DispatchEvent>>,
    make_transport: F,
) -> Result<RunOutcome, DispatchError>
where
    F: FnOnce(&RunConfig, &Workspace) -> Arc<dyn Transport>,
{
    info!(run_id = %config.run_id, "Starting run");

    let selection = SelectionFile::new(config.selection_path());
    let hosts = HostResolver::new(catalog, &selection)
        .resolve(request.selector.as_deref(), request.instance.as_deref())?;

    let ssh_config = prepare_ssh_config(config, catalog)?;

    let wrap = request
        .tmux
        .as_ref()
        .map(|name| SessionWrap::named_or_run_id(name.as_deref(), &config.run_id));
    let command = RemoteCommand::build(request.command_text.clone(), wrap.as_ref());
    if command.has_quote_hazard() {
        warn!(
            command = %command.text(),
            "Command contains a double quote; the tmux wrap will not preserve it"
        );
    }

    let retention = if config.retain_logs {
        Retention::Archive(config.logs_root())
    } else {
        Retention::Discard
    };
    let mut workspace = Workspace::create(
        &config.workspace_root,
        &config.run_id,
        &hosts,
        &command,
        &ssh_config,
        retention,
    )?;

    let engine = DispatchEngine::new(make_transport(config, &workspace))
        .with_max_parallel(config.width(hosts.len()));
    let mut report = engine
        .dispatch(
            &hosts,
            &command,
            workspace.logs_dir(),
            controller.token(),
            progress,
        )
        .await;

    if let Err(e) = controller.begin_cleanup() {
        warn!(error = %e, "Unexpected run phase before cleanup");
    }
    let workspace_path = workspace.path().to_path_buf();
    let archived_to = workspace.finalize();
    if let Some(dest) = &archived_to {
        report.rebase_output_paths(&workspace_path, dest);
    }
    if let Err(e) = controller.finish() {
        warn!(error = %e, "Unexpected run phase after cleanup");
    }

    Ok(RunOutcome {
        hosts,
        command,
        report,
        archived_to,
    })
}
