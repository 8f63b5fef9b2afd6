//! fleetrun - run a shell command across a fleet of hosts over SSH.

use std::path::PathBuf;

use clap::Parser;
use fleetrun_core::RemoteCommand;
use fleetrun_dispatch::{
    execute_run, openssh_transport, CancellationController, DispatchEvent, JsonInventory,
    RunConfig, RunRequest,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod report;

/// Run a shell command on every host of a fleet
#[derive(Parser, Debug)]
#[command(name = "fleetrun", version)]
#[command(about = "Run a shell command concurrently on a fleet of hosts over SSH", long_about = None)]
struct Cli {
    /// Command to run; all positional words are joined with spaces.
    /// Everything from the first command word on belongs to the command.
    #[arg(
        required = true,
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,

    /// Fleet name prefix (trailing `*` allowed) or path to a host list file
    #[arg(short, long, value_name = "SELECTOR")]
    fleet: Option<String>,

    /// Single instance; replaces the fleet's hosts
    #[arg(short, long, value_name = "NAME")]
    instance: Option<String>,

    /// Run inside a detached tmux session (default name: the run id)
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
    tmux: Option<String>,

    /// ssh config to use instead of the generated one
    #[arg(long, value_name = "PATH")]
    sshconfig: Option<PathBuf>,

    /// Suppress the per-host progress line
    #[arg(short, long)]
    quiet: bool,

    /// Log what fleetrun is doing
    #[arg(short, long)]
    verbose: bool,

    /// Trace everything, including ssh's own debug output
    #[arg(long)]
    debug: bool,

    /// Use the existing ssh config instead of regenerating it
    #[arg(long)]
    cache: bool,

    /// Keep the run workspace under <home>/logs/<run id>
    #[arg(long)]
    logs: bool,

    /// Maximum number of hosts worked on at once (default: all)
    #[arg(short, long, value_name = "N")]
    parallel: Option<usize>,

    /// ssh connect timeout in seconds
    #[arg(short, long, value_name = "SECS", default_value = "10")]
    timeout: u64,

    /// Directory holding instances.json, selection, ssh_config and logs/
    #[arg(long, env = "FLEETRUN_HOME", value_name = "DIR")]
    home: Option<PathBuf>,
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        if self.debug {
            "fleetrun=trace"
        } else if self.verbose {
            "fleetrun=info"
        } else {
            "fleetrun=warn"
        }
    }

    fn run_config(&self) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            home: self.home.clone().unwrap_or(defaults.home),
            ssh_config: self.sshconfig.clone(),
            retain_logs: self.logs,
            use_cache: self.cache,
            quiet: self.quiet,
            debug: self.debug,
            max_parallel: self.parallel,
            connect_timeout_secs: self.timeout,
            ..defaults
        }
    }

    fn run_request(&self) -> RunRequest {
        RunRequest {
            selector: self.fleet.clone(),
            instance: self.instance.clone(),
            command_text: RemoteCommand::join_tokens(&self.command),
            tmux: self
                .tmux
                .as_ref()
                .map(|name| Some(name.clone()).filter(|n| !n.is_empty())),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so remote output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(cli.debug)
        .init();

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let config = cli.run_config();
    let request = cli.run_request();
    debug!(?config, ?request, "Parsed arguments");

    let catalog = JsonInventory::new(config.inventory_path());
    let controller = CancellationController::new();
    let signals = controller.listen_for_signals();

    let (progress_tx, printer) = if config.quiet {
        (None, None)
    } else {
        let (tx, rx) = mpsc::unbounded_channel();
        (Some(tx), Some(tokio::spawn(print_progress(rx))))
    };

    let result = execute_run(
        &config,
        &request,
        &catalog,
        &controller,
        progress_tx,
        openssh_transport,
    )
    .await;

    signals.abort();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let outcome = result?;
    report::print_report(&outcome);
    info!(run_id = %config.run_id, exit_code = outcome.exit_code(), "Run finished");
    Ok(outcome.exit_code())
}

/// One line per finished host, pssh style.
async fn print_progress(mut rx: mpsc::UnboundedReceiver<DispatchEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            DispatchEvent::Started { host } => debug!(host = %host, "Started"),
            DispatchEvent::Finished {
                result,
                completed,
                total,
            } => {
                eprintln!("{}", report::progress_line(&result, completed, total));
            }
        }
    }
}
