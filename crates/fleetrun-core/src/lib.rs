//! fleetrun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process spawning
//! - The filesystem
//! - Runtime specifics
//!
//! Everything here describes a single fan-out run: which hosts are targeted,
//! what is executed on them and how each host fared.

pub mod command;
pub mod error;
pub mod host;
pub mod ids;
pub mod instance;
pub mod result;
pub mod status;

// Re-export commonly used types
pub use command::{RemoteCommand, SessionWrap};
pub use error::CoreError;
pub use host::HostSet;
pub use ids::RunId;
pub use instance::InstanceRecord;
pub use result::{DispatchReport, DispatchResult};
pub use status::{HostStatus, RunPhase};
