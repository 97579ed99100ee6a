//! Connection configuration module
//!
//! SSH settings shared by every session of a run: connect timeout and
//! host key policy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default connection timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Settings applied to every SSH session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// TCP connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub connect_timeout: u64,

    /// Reject hosts missing from known_hosts. A changed key is always rejected.
    #[serde(default)]
    pub host_key_checking: bool,

    /// known_hosts file (default: ~/.ssh/known_hosts)
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_TIMEOUT,
            host_key_checking: false,
            known_hosts: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Resolved known_hosts path, if one can be determined
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        match &self.known_hosts {
            Some(path) => Some(expand_path(&path.to_string_lossy())),
            None => dirs::home_dir().map(|h| h.join(".ssh").join("known_hosts")),
        }
    }
}

/// Expand a leading `~/` to the local home directory
pub fn expand_path(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
