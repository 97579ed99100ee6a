//! Inventory management for DeployMate.
//!
//! The inventory document maps host names to connection records under
//! `all.hosts`:
//!
//! ```yaml
//! all:
//!   hosts:
//!     web1:
//!       address: 10.0.0.5
//!       user: ops
//!       key_file: id.pem
//!     db1:
//!       address: 10.0.0.9
//!       user: admin
//!       port: 2222
//!       password: secret
//! ```
//!
//! Host order is preserved; it is the order hosts are connected and visited in.

pub mod host;

pub use host::{Credential, Host, HostParseError, HostRecord, DEFAULT_SSH_PORT};

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::error::ParseError;

#[derive(Debug, Deserialize)]
struct InventoryDocument {
    all: AllGroup,
}

#[derive(Debug, Deserialize)]
struct AllGroup {
    #[serde(default)]
    hosts: Option<IndexMap<String, Option<HostRecord>>>,
}

/// Named collection of target hosts, read-only once built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    hosts: IndexMap<String, Host>,
}

impl Inventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from hosts; a later host with a duplicate name replaces the earlier one
    pub fn from_hosts(hosts: impl IntoIterator<Item = Host>) -> Self {
        Self {
            hosts: hosts.into_iter().map(|h| (h.name.clone(), h)).collect(),
        }
    }

    /// Parse an inventory document.
    ///
    /// `source` is only used for error messages; `key_dir` anchors relative key paths.
    pub fn from_yaml(yaml: &str, source: &Path, key_dir: &Path) -> Result<Self, ParseError> {
        let document: InventoryDocument = serde_yaml::from_str(yaml)
            .map_err(|e| ParseError::new(source, format!("invalid inventory: {}", e)))?;

        let mut hosts = IndexMap::new();
        for (name, record) in document.all.hosts.unwrap_or_default() {
            let host = Host::from_record(&name, record.unwrap_or_default(), key_dir)
                .map_err(|e| ParseError::new(source, e.to_string()))?;
            hosts.insert(name, host);
        }

        Ok(Self { hosts })
    }

    /// Look up a host by name
    pub fn get(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// Iterate hosts in inventory order
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// All host names in inventory order
    pub fn host_names(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    /// Check whether a host is defined
    pub fn contains(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
