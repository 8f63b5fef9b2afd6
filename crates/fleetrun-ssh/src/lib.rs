//! OpenSSH transport for fleetrun
//!
//! This crate runs a [`RemoteCommand`](fleetrun_core::RemoteCommand) on one
//! host by spawning the system `ssh` client, capturing its output to a file
//! and killing the child when the run is cancelled.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use fleetrun_core::RemoteCommand;
//! use fleetrun_ssh::{OpenSshTransport, Transport};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = OpenSshTransport::new("ssh")
//!         .with_config_file("/tmp/fleetrun-run/sshconfig")
//!         .with_connect_timeout(10);
//!
//!     let outcome = transport
//!         .execute(
//!             "web1",
//!             &RemoteCommand::build("uptime", None),
//!             Path::new("/tmp/fleetrun-run/logs/web1"),
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod executor;
mod transport;

pub use config::render_ssh_config;
pub use error::TransportError;
pub use executor::{OpenSshTransport, CONNECTION_FAILED_EXIT};
pub use transport::{ExecOutcome, Transport};
