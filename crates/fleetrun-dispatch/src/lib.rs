//! fleetrun dispatch
//!
//! Everything between the command line and the transport:
//!
//! - [`resolver`] turns a fleet selector or instance name into hosts
//! - [`workspace`] owns the per-run directory and its cleanup
//! - [`engine`] fans the command out, one worker per host
//! - [`cancel`] turns SIGINT/SIGTERM into a cancelled run
//! - [`run`] ties them together for one invocation

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod run;
pub mod sshconfig;
pub mod workspace;

// Re-export commonly used types
pub use cancel::CancellationController;
pub use catalog::{InstanceCatalog, JsonInventory, SelectionFile, StaticCatalog};
pub use config::RunConfig;
pub use engine::{DispatchEngine, DispatchEvent};
pub use error::DispatchError;
pub use resolver::HostResolver;
pub use run::{execute_run, openssh_transport, RunOutcome, RunRequest, EXIT_CANCELLED};
pub use workspace::{Retention, Workspace};
