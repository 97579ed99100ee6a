//! Live session bookkeeping for a run.
//!
//! The [`ConnectionManager`] opens one session per inventory host, keeps the
//! ones that succeeded, and closes them all when the run drains. A host that
//! fails to connect is logged and left out; it never aborts the others.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CommandResult, Connection, ConnectionConfig, ConnectionError, ConnectionResult};
use crate::inventory::{Host, Inventory};

/// Opens sessions to inventory hosts
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate to `host`
    async fn connect(&self, host: &Host) -> ConnectionResult<Arc<dyn Connection>>;
}

/// [`Connector`] that opens SSH sessions
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    config: ConnectionConfig,
}

impl SshConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, host: &Host) -> ConnectionResult<Arc<dyn Connection>> {
        #[cfg(feature = "russh")]
        {
            let session = super::RusshConnection::new(host.clone(), self.config.clone());
            session.connect().await?;
            return Ok(Arc::new(session));
        }

        #[cfg(not(feature = "russh"))]
        {
            Err(ConnectionError::InvalidConfig(format!(
                "cannot connect to {}: built without an SSH backend",
                host.name
            )))
        }
    }
}

/// Owns the live sessions of one run, keyed by inventory host name
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    sessions: IndexMap<String, Arc<dyn Connection>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sessions: IndexMap::new(),
        }
    }

    /// Connect to every inventory host, in inventory order.
    ///
    /// Returns the hosts that could not be reached together with the reason.
    /// Hosts that already have a live session are left alone.
    pub async fn connect_all(&mut self, inventory: &Inventory) -> Vec<(String, ConnectionError)> {
        let mut failures = Vec::new();

        for host in inventory.hosts() {
            if self.sessions.contains_key(&host.name) {
                continue;
            }

            match self.connector.connect(host).await {
                Ok(session) => {
                    info!(host = %host.name, identity = %session.identifier(), "Connected");
                    self.sessions.insert(host.name.clone(), session);
                }
                Err(e) => {
                    warn!(host = %host.name, error = %e, "Failed to connect, host will be skipped");
                    failures.push((host.name.clone(), e));
                }
            }
        }

        failures
    }

    /// Session for `host`, if it connected
    pub fn get(&self, host: &str) -> Option<Arc<dyn Connection>> {
        self.sessions.get(host).cloned()
    }

    /// Insert an already-open session
    pub fn insert(&mut self, host: impl Into<String>, session: Arc<dyn Connection>) {
        self.sessions.insert(host.into(), session);
    }

    /// Run `command` on every live session.
    ///
    /// A host whose command could not be run maps to `None`.
    pub async fn broadcast(&self, command: &str) -> IndexMap<String, Option<CommandResult>> {
        let mut results = IndexMap::with_capacity(self.sessions.len());

        for (name, session) in &self.sessions {
            let result = match session.execute(command).await {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(host = %name, error = %e, "Broadcast command failed");
                    None
                }
            };
            results.insert(name.clone(), result);
        }

        results
    }

    /// Close and forget every session. Safe to call more than once.
    pub async fn close_all(&mut self) {
        for (name, session) in self.sessions.drain(..) {
            if let Err(e) = session.close().await {
                warn!(host = %name, error = %e, "Error while closing connection");
            } else {
                debug!(host = %name, "Connection closed");
            }
        }
    }

    /// Names of hosts with a live session, in connection order
    pub fn live_hosts(&self) -> Vec<&str> {
        self.sessions.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("live_hosts", &self.live_hosts())
            .finish()
    }
}
