//! Host definition for the DeployMate inventory.
//!
//! A [`Host`] is a named remote machine plus everything needed to open an SSH
//! session to it. Hosts are immutable once the inventory has been built.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Errors raised while turning an inventory record into a [`Host`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostParseError {
    #[error("host '{0}' has no address")]
    MissingAddress(String),

    #[error("host '{0}' has no user")]
    MissingUser(String),

    #[error("host '{0}' defines both key_file and password; exactly one credential is allowed")]
    AmbiguousCredential(String),

    #[error("host '{0}' defines neither key_file nor password")]
    MissingCredential(String),
}

/// How a host authenticates. Exactly one kind is present per host.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Local path to a private key
    KeyFile(PathBuf),
    /// Plain password
    Password(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Credential::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
        }
    }
}

/// Raw inventory record as it appears under `all.hosts.<name>`.
#[derive(Debug, Clone, Deserialize)]
pub struct HostRecord {
    /// Hostname or IP to connect to
    #[serde(default, alias = "host")]
    pub address: Option<String>,

    /// Remote login user
    #[serde(default)]
    pub user: Option<String>,

    /// SSH port (default: 22)
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Private key path, relative paths resolve against the key directory
    #[serde(default, alias = "ssh_private_key_file")]
    pub key_file: Option<String>,

    /// SSH password (discouraged, use keys)
    #[serde(default)]
    pub password: Option<String>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Default for HostRecord {
    fn default() -> Self {
        Self {
            address: None,
            user: None,
            port: default_ssh_port(),
            key_file: None,
            password: None,
        }
    }
}

/// A managed host in the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Inventory name, unique within one inventory
    pub name: String,
    /// Hostname or IP to connect to
    pub address: String,
    /// Remote login user
    pub user: String,
    /// SSH port
    pub port: u16,
    /// Key material or password
    pub credential: Credential,
}

impl Host {
    /// Create a host that authenticates with a private key
    pub fn with_key(
        name: impl Into<String>,
        address: impl Into<String>,
        user: impl Into<String>,
        key_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            user: user.into(),
            port: DEFAULT_SSH_PORT,
            credential: Credential::KeyFile(key_file.into()),
        }
    }

    /// Create a host that authenticates with a password
    pub fn with_password(
        name: impl Into<String>,
        address: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            user: user.into(),
            port: DEFAULT_SSH_PORT,
            credential: Credential::Password(password.into()),
        }
    }

    /// Override the SSH port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build a host from its inventory record.
    ///
    /// A relative `key_file` is joined onto `key_dir`; a leading `./` is ignored.
    pub fn from_record(
        name: &str,
        record: HostRecord,
        key_dir: &Path,
    ) -> Result<Self, HostParseError> {
        let address = record
            .address
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| HostParseError::MissingAddress(name.to_string()))?;
        let user = record
            .user
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| HostParseError::MissingUser(name.to_string()))?;

        let credential = match (record.key_file, record.password) {
            (Some(_), Some(_)) => {
                return Err(HostParseError::AmbiguousCredential(name.to_string()))
            }
            (Some(key), None) => Credential::KeyFile(resolve_key_path(&key, key_dir)),
            (None, Some(password)) => Credential::Password(password),
            (None, None) => return Err(HostParseError::MissingCredential(name.to_string())),
        };

        Ok(Self {
            name: name.to_string(),
            address,
            user,
            port: record.port,
            credential,
        })
    }

    /// Connection identity used in log lines and errors: `user@address:port`
    pub fn identity(&self) -> String {
        format!("{}@{}:{}", self.user, self.address, self.port)
    }
}

fn resolve_key_path(key: &str, key_dir: &Path) -> PathBuf {
    let path = Path::new(key);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let trimmed = key.strip_prefix("./").unwrap_or(key);
    key_dir.join(trimmed)
}
