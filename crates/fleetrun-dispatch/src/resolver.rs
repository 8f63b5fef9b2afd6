//! Selector to host list resolution.

use std::path::Path;

use fleetrun_core::{CoreError, HostSet};
use tracing::{debug, info};

use crate::catalog::{InstanceCatalog, SelectionFile};
use crate::error::DispatchError;

/// Turns a fleet selector and/or instance name into a [`HostSet`].
pub struct HostResolver<'a> {
    catalog: &'a dyn InstanceCatalog,
    selection: &'a SelectionFile,
}

impl<'a> HostResolver<'a> {
    pub fn new(catalog: &'a dyn InstanceCatalog, selection: &'a SelectionFile) -> Self {
        Self { catalog, selection }
    }

    /// Resolve the hosts a run targets.
    ///
    /// An explicit instance replaces whatever the selector would have
    /// produced. Without a selector the saved selection is used. A selector
    /// naming an existing file is read as a host list; anything else is a
    /// fleet prefix. Resolving to nothing is an error.
    pub fn resolve(
        &self,
        selector: Option<&str>,
        instance: Option<&str>,
    ) -> Result<HostSet, DispatchError> {
        if let Some(name) = instance.map(str::trim).filter(|n| !n.is_empty()) {
            if let Some(sel) = selector {
                debug!(selector = %sel, instance = %name, "Instance overrides fleet selector");
            }
            return self.resolve_instance(name);
        }

        let hosts = match selector.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.resolve_saved_selection()?,
            Some(sel) if Path::new(sel).is_file() => self.resolve_file(Path::new(sel))?,
            Some(sel) => self.resolve_fleet(sel)?,
        };

        info!(hosts = hosts.len(), "Resolved hosts");
        Ok(hosts)
    }

    fn resolve_instance(&self, name: &str) -> Result<HostSet, DispatchError> {
        let found = self.catalog.instance(name)?;
        Ok(HostSet::new(found.map(|i| i.name), name)?)
    }

    fn resolve_fleet(&self, prefix: &str) -> Result<HostSet, DispatchError> {
        let members = self.catalog.fleet(prefix)?;
        debug!(fleet = %prefix, members = members.len(), "Fleet lookup");
        Ok(HostSet::new(members.into_iter().map(|i| i.name), prefix)?)
    }

    fn resolve_file(&self, path: &Path) -> Result<HostSet, DispatchError> {
        let text = std::fs::read_to_string(path).map_err(|source| DispatchError::HostList {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(HostSet::parse(&text, &path.display().to_string())?)
    }

    fn resolve_saved_selection(&self) -> Result<HostSet, DispatchError> {
        let origin = self.selection.path().display().to_string();
        match self.selection.load()? {
            Some(text) => Ok(HostSet::parse(&text, &origin)?),
            None => Err(CoreError::EmptyHostSet(origin).into()),
        }
    }
}
