//! Instance metadata and saved selection.
//!
//! The catalog answers "which instances exist"; the selection file holds the
//! host list used when the caller names no fleet.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fleetrun_core::InstanceRecord;
use tracing::debug;

use crate::error::DispatchError;

/// Source of instance metadata.
pub trait InstanceCatalog: Send + Sync {
    /// All known instances, in catalog order.
    fn instances(&self) -> Result<Vec<InstanceRecord>, DispatchError>;

    /// Instances whose name starts with `prefix`, in catalog order.
    fn fleet(&self, prefix: &str) -> Result<Vec<InstanceRecord>, DispatchError> {
        Ok(self
            .instances()?
            .into_iter()
            .filter(|i| i.in_fleet(prefix))
            .collect())
    }

    /// The instance named exactly `name`.
    fn instance(&self, name: &str) -> Result<Option<InstanceRecord>, DispatchError> {
        Ok(self.instances()?.into_iter().find(|i| i.name == name))
    }
}

/// Inventory stored as a JSON array of [`InstanceRecord`]s.
///
/// A missing file is an empty inventory.
#[derive(Debug, Clone)]
pub struct JsonInventory {
    path: PathBuf,
}

impl JsonInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstanceCatalog for JsonInventory {
    fn instances(&self) -> Result<Vec<InstanceRecord>, DispatchError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No inventory file, treating as empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(DispatchError::Inventory {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Vec<InstanceRecord>);

impl InstanceCatalog for StaticCatalog {
    fn instances(&self) -> Result<Vec<InstanceRecord>, DispatchError> {
        Ok(self.0.clone())
    }
}

/// The saved default selection: a whitespace separated host list.
#[derive(Debug, Clone)]
pub struct SelectionFile {
    path: PathBuf,
}

impl SelectionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw contents, or `None` when nothing has been saved.
    pub fn load(&self) -> Result<Option<String>, DispatchError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DispatchError::HostList {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_json_inventory_fleet_and_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "instances.json",
            r#"[
                {"name": "testy1", "address": "10.0.0.1"},
                {"name": "other1", "address": "10.0.0.9", "user": "ec2-user"},
                {"name": "testy2", "address": "10.0.0.2"}
            ]"#,
        );
        let inventory = JsonInventory::new(path);

        let names: Vec<String> = inventory
            .fleet("testy*")
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["testy1", "testy2"]);

        let other = inventory.instance("other1").unwrap().unwrap();
        assert_eq!(other.user.as_deref(), Some("ec2-user"));
        assert!(inventory.instance("other").unwrap().is_none());
    }

    #[test]
    fn test_missing_inventory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = JsonInventory::new(dir.path().join("nope.json"));
        assert!(inventory.instances().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = JsonInventory::new(write(dir.path(), "i.json", "{not json"));
        assert!(matches!(
            inventory.instances(),
            Err(DispatchError::InventoryFormat(_))
        ));
    }

    #[test]
    fn test_selection_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SelectionFile::new(dir.path().join("selection"));
        assert!(missing.load().unwrap().is_none());

        let saved = SelectionFile::new(write(dir.path(), "selection", "h1\nh2\n"));
        assert_eq!(saved.load().unwrap().as_deref(), Some("h1\nh2\n"));
    }
}
