//! Instance metadata as kept in the local inventory.

use serde::{Deserialize, Serialize};

/// A single remote machine known to the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Instance name; doubles as the SSH host alias.
    pub name: String,

    /// Address the instance is reachable at (IP or DNS name).
    pub address: String,

    /// Login user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// SSH port, when not 22.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Private key used to log in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl InstanceRecord {
    /// Create a new InstanceRecord with minimal required fields.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            user: None,
            port: None,
            identity_file: None,
        }
    }

    /// Builder method to set the login user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Builder method to set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set the identity file.
    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Fleet membership test: the name starts with the fleet prefix.
    ///
    /// A single trailing `*` on the prefix is ignored, so `web*` and `web`
    /// select the same instances.
    pub fn in_fleet(&self, prefix: &str) -> bool {
        let prefix = prefix.strip_suffix('*').unwrap_or(prefix);
        self.name.starts_with(prefix)
    }
}
