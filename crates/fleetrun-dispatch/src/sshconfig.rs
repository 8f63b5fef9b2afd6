//! Preparing the ssh config a run snapshots.

use std::path::{Path, PathBuf};

use fleetrun_ssh::render_ssh_config;
use tracing::{debug, info};

use crate::catalog::InstanceCatalog;
use crate::config::RunConfig;
use crate::error::DispatchError;

/// Make sure the ssh config source exists and return its path.
///
/// The generated config is rewritten from the inventory unless `--cache` was
/// given. A user-supplied config is never rewritten.
pub fn prepare_ssh_config(
    config: &RunConfig,
    catalog: &dyn InstanceCatalog,
) -> Result<PathBuf, DispatchError> {
    let source = config.ssh_config_source();
    let regenerate = !config.use_cache && config.ssh_config.is_none();

    if regenerate {
        let instances = catalog.instances()?;
        if !instances.is_empty() {
            write_config(&source, &render_ssh_config(&instances))?;
            info!(path = %source.display(), instances = instances.len(), "Generated ssh config");
        } else if source.is_file() {
            debug!("Inventory empty, keeping existing ssh config");
        } else {
            // Nothing to render; hosts still resolve through ssh's defaults.
            write_config(&source, "")?;
            info!(path = %source.display(), "Inventory empty, wrote empty ssh config");
        }
    }

    if !source.is_file() {
        return Err(DispatchError::TransportConfig(format!(
            "ssh config '{}' not found",
            source.display()
        )));
    }
    Ok(source)
}

fn write_config(path: &Path, contents: &str) -> Result<(), DispatchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DispatchError::TransportConfig(format!("cannot create '{}': {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, contents).map_err(|e| {
        DispatchError::TransportConfig(format!("cannot write '{}': {}", path.display(), e))
    })
}
