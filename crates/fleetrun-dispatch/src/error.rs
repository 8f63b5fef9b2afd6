//! Errors that abort a run before or around dispatch.
//!
//! Per-host failures are not errors at this level; they are recorded in the
//! host's [`DispatchResult`](fleetrun_core::DispatchResult).

use std::path::PathBuf;

use fleetrun_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The selector matched no hosts.
    #[error("Resolution failed: {0}")]
    Resolution(#[from] CoreError),

    /// A host list file or selection file could not be read.
    #[error("Failed to read host list '{path}': {source}")]
    HostList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The instance inventory could not be read.
    #[error("Failed to read inventory '{path}': {source}")]
    Inventory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The instance inventory is not valid JSON.
    #[error("Invalid inventory format: {0}")]
    InventoryFormat(#[from] serde_json::Error),

    /// The ssh config could not be generated or found.
    #[error("Transport config error: {0}")]
    TransportConfig(String),

    /// The run workspace could not be created or written.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
