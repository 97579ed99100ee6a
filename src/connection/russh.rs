//! Russh connection module
//!
//! SSH sessions built on the russh crate. Russh is async-native, so a session
//! runs on the same Tokio runtime as the engine without blocking threads.
//!
//! A session moves through three states: unconnected, connected, closed.
//! Commands and uploads are only accepted while connected.

use async_trait::async_trait;
use parking_lot::Mutex;
use russh::client::{Handle, Handler};
use russh::keys::key::PublicKey;
use russh::ChannelMsg;
use russh_keys::load_secret_key;
use russh_sftp::client::SftpSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use super::config::ConnectionConfig;
use super::{CommandResult, Connection, ConnectionError, ConnectionResult, RusshError};
use crate::inventory::{Credential, Host};

/// Lifecycle of a [`RusshConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Closed,
}

/// Client handler for russh with host key verification
struct ClientHandler {
    /// Identity used in log lines
    identifier: String,
    address: String,
    port: u16,
    known_hosts: Option<PathBuf>,
    /// Whether to accept hosts missing from known_hosts
    accept_unknown: bool,
    /// Set when we refuse the server key, so the caller can report why
    rejection: Arc<Mutex<Option<String>>>,
}

impl ClientHandler {
    fn reject(&self, reason: String) -> Result<bool, RusshError> {
        warn!(host = %self.identifier, reason = %reason, "Rejecting server host key");
        *self.rejection.lock() = Some(reason);
        Ok(false)
    }

    fn unknown_host(&self) -> Result<bool, RusshError> {
        if self.accept_unknown {
            debug!(host = %self.identifier, "Host not found in known_hosts, accepting");
            Ok(true)
        } else {
            self.reject("host not found in known_hosts".to_string())
        }
    }
}

#[async_trait]
impl Handler for ClientHandler {
    type Error = RusshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let Some(path) = &self.known_hosts else {
            return self.unknown_host();
        };

        match russh_keys::check_known_hosts_path(&self.address, self.port, server_public_key, path)
        {
            Ok(true) => {
                debug!(host = %self.identifier, "Host key verified against known_hosts");
                Ok(true)
            }
            Ok(false) => self.unknown_host(),
            Err(russh_keys::Error::KeyChanged { line }) => self.reject(format!(
                "host key changed (known_hosts line {})",
                line
            )),
            Err(e) => {
                debug!(host = %self.identifier, error = %e, "Could not read known_hosts");
                self.unknown_host()
            }
        }
    }
}

/// An SSH session to one inventory host
pub struct RusshConnection {
    host: Host,
    identifier: String,
    config: ConnectionConfig,
    /// Russh client handle, present only while connected
    handle: Arc<RwLock<Option<Handle<ClientHandler>>>>,
    state: Mutex<SessionState>,
}

impl RusshConnection {
    /// Create an unconnected session for `host`
    pub fn new(host: Host, config: ConnectionConfig) -> Self {
        let identifier = host.identity();
        Self {
            host,
            identifier,
            config,
            handle: Arc::new(RwLock::new(None)),
            state: Mutex::new(SessionState::Unconnected),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Open the TCP connection and authenticate.
    ///
    /// Uses the host's key file if it has one, otherwise its password.
    /// There is no retry; a failure leaves the session unconnected.
    pub async fn connect(&self) -> ConnectionResult<()> {
        if self.state() == SessionState::Connected {
            return Err(ConnectionError::AlreadyConnected(self.identifier.clone()));
        }

        debug!(
            host = %self.host.address,
            port = %self.host.port,
            user = %self.host.user,
            "Connecting via SSH (russh)"
        );

        let timeout = self.config.timeout_duration();
        let addr = format!("{}:{}", self.host.address, self.host.port);
        let socket = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr))
            .await
            .map_err(|_| ConnectionError::Timeout {
                host: self.identifier.clone(),
                secs: timeout.as_secs(),
            })?
            .map_err(|e| self.connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

        socket
            .set_nodelay(true)
            .map_err(|e| self.connection_failed(format!("Failed to set TCP_NODELAY: {}", e)))?;

        let rejection = Arc::new(Mutex::new(None));
        let handler = ClientHandler {
            identifier: self.identifier.clone(),
            address: self.host.address.clone(),
            port: self.host.port,
            known_hosts: self.config.known_hosts_path(),
            accept_unknown: !self.config.host_key_checking,
            rejection: Arc::clone(&rejection),
        };

        let client_config = Arc::new(russh::client::Config::default());
        let mut session = match russh::client::connect_stream(client_config, socket, handler).await
        {
            Ok(session) => session,
            Err(e) => {
                if let Some(reason) = rejection.lock().take() {
                    return Err(ConnectionError::HostKeyRejected {
                        host: self.identifier.clone(),
                        message: reason,
                    });
                }
                return Err(self.connection_failed(format!("SSH handshake failed: {}", e.0)));
            }
        };

        self.authenticate(&mut session).await?;

        *self.handle.write().await = Some(session);
        *self.state.lock() = SessionState::Connected;
        debug!(identifier = %self.identifier, "SSH connection established");
        Ok(())
    }

    async fn authenticate(&self, session: &mut Handle<ClientHandler>) -> ConnectionResult<()> {
        let user = self.host.user.as_str();
        let authenticated = match &self.host.credential {
            Credential::KeyFile(key_path) => {
                let key_pair = load_secret_key(key_path, None).map_err(|e| {
                    self.auth_failed(format!("Failed to load key {}: {}", key_path.display(), e))
                })?;
                session
                    .authenticate_publickey(user, Arc::new(key_pair))
                    .await
                    .map_err(|e| self.auth_failed(format!("Key authentication error: {}", e)))?
            }
            Credential::Password(password) => session
                .authenticate_password(user, password)
                .await
                .map_err(|e| self.auth_failed(format!("Password authentication error: {}", e)))?,
        };

        if authenticated {
            Ok(())
        } else {
            Err(self.auth_failed("credential rejected by server".to_string()))
        }
    }

    /// Open an SFTP transport over the existing session
    pub async fn transport(&self) -> ConnectionResult<SftpSession> {
        let handle_guard = self.handle.read().await;
        let handle = handle_guard
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected(self.identifier.clone()))?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| self.transfer_failed(format!("Failed to open channel: {}", e)))?;
        drop(handle_guard);

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            self.transfer_failed(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| self.transfer_failed(format!("Failed to create SFTP session: {}", e)))
    }

    fn connection_failed(&self, message: String) -> ConnectionError {
        ConnectionError::ConnectionFailed {
            host: self.identifier.clone(),
            message,
        }
    }

    fn auth_failed(&self, message: String) -> ConnectionError {
        ConnectionError::AuthenticationFailed {
            host: self.identifier.clone(),
            message,
        }
    }

    fn exec_failed(&self, message: String) -> ConnectionError {
        ConnectionError::ExecutionFailed {
            host: self.identifier.clone(),
            message,
        }
    }

    fn transfer_failed(&self, message: String) -> ConnectionError {
        ConnectionError::TransferFailed {
            host: self.identifier.clone(),
            message,
        }
    }
}

#[async_trait]
impl Connection for RusshConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn remote_user(&self) -> &str {
        &self.host.user
    }

    async fn is_alive(&self) -> bool {
        self.state() == SessionState::Connected && self.handle.read().await.is_some()
    }

    async fn execute(&self, command: &str) -> ConnectionResult<CommandResult> {
        trace!(host = %self.identifier, command = %command, "Executing remote command");

        let handle_guard = self.handle.read().await;
        let handle = handle_guard
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected(self.identifier.clone()))?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| self.exec_failed(format!("Failed to open channel: {}", e)))?;
        drop(handle_guard);

        channel
            .exec(true, command)
            .await
            .map_err(|e| self.exec_failed(format!("Failed to execute command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // extended data type 1 is stderr
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        // Unknown exit status is reported as i32::MAX
        let exit_code: i32 = exit_code.map(|e| e as i32).unwrap_or(i32::MAX);
        trace!(exit_code = %exit_code, "Command completed");

        Ok(CommandResult::from_exit(
            exit_code,
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        ))
    }

    async fn upload(&self, local_path: &Path, remote_path: &Path) -> ConnectionResult<()> {
        debug!(
            local = %local_path.display(),
            remote = %remote_path.display(),
            "Uploading file via SFTP"
        );

        let sftp = self.transport().await?;

        let mut local_file = tokio::fs::File::open(local_path).await.map_err(|e| {
            self.transfer_failed(format!(
                "Failed to open local file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let remote_path_str = remote_path.to_string_lossy().to_string();
        let mut remote_file = sftp.create(&remote_path_str).await.map_err(|e| {
            self.transfer_failed(format!(
                "Failed to create remote file {}: {}",
                remote_path_str, e
            ))
        })?;

        tokio::io::copy(&mut local_file, &mut remote_file)
            .await
            .map_err(|e| self.transfer_failed(format!("Failed to write remote file: {}", e)))?;

        remote_file
            .shutdown()
            .await
            .map_err(|e| self.transfer_failed(format!("Failed to close remote file: {}", e)))?;

        Ok(())
    }

    async fn close(&self) -> ConnectionResult<()> {
        let handle = self.handle.write().await.take();
        *self.state.lock() = SessionState::Closed;

        if let Some(handle) = handle {
            debug!(identifier = %self.identifier, "Closing SSH connection");
            let _ = handle
                .disconnect(
                    russh::Disconnect::ByApplication,
                    "Connection closed by client",
                    "en",
                )
                .await;
        }

        Ok(())
    }
}

impl std::fmt::Debug for RusshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshConnection")
            .field("identifier", &self.identifier)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host::with_password("web1", "127.0.0.1", "ops", "secret").port(1)
    }

    #[tokio::test]
    async fn test_new_session_is_unconnected() {
        let conn = RusshConnection::new(host(), ConnectionConfig::default());
        assert_eq!(conn.state(), SessionState::Unconnected);
        assert_eq!(conn.identifier(), "ops@127.0.0.1:1");
        assert!(!conn.is_alive().await);
    }

    #[tokio::test]
    async fn test_execute_requires_connection() {
        let conn = RusshConnection::new(host(), ConnectionConfig::default());
        let err = conn.execute("true").await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let conn = RusshConnection::new(host(), ConnectionConfig::default());
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(conn.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let config = ConnectionConfig {
            connect_timeout: 2,
            ..Default::default()
        };
        let conn = RusshConnection::new(host(), config);
        let err = conn.connect().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::ConnectionFailed { .. } | ConnectionError::Timeout { .. }
        ));
        assert_eq!(conn.state(), SessionState::Unconnected);
    }
}
