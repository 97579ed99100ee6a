//! Connection layer for remote host communication.
//!
//! Handlers never talk to SSH directly; they see a [`Connection`], which can
//! run a shell command and copy a local file to the remote side. The default
//! transport is [`russh::RusshConnection`] (pure Rust SSH plus SFTP).
//!
//! # Overview
//!
//! - [`Connection`]: an authenticated session to one host
//! - [`Connector`]: opens sessions for inventory hosts
//! - [`ConnectionManager`]: owns the live sessions of one run
//! - [`FileTransfer`]: checked local-to-remote copy over a session
//!
//! # Example
//!
//! ```rust,ignore
//! use deploymate::connection::{ConnectionConfig, ConnectionManager, SshConnector};
//!
//! let connector = SshConnector::new(ConnectionConfig::default());
//! let mut manager = ConnectionManager::new(std::sync::Arc::new(connector));
//! manager.connect_all(&inventory).await;
//!
//! for (host, result) in manager.broadcast("uptime").await {
//!     println!("{}: {:?}", host, result.map(|r| r.stdout));
//! }
//! manager.close_all().await;
//! ```

/// Connection configuration types.
pub mod config;

/// Live session bookkeeping for a run.
pub mod manager;

/// Pure Rust SSH implementation using russh.
#[cfg(feature = "russh")]
pub mod russh;

/// Checked file uploads.
pub mod transfer;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use config::ConnectionConfig;
pub use manager::{ConnectionManager, Connector, SshConnector};
#[cfg(feature = "russh")]
pub use russh::RusshConnection;
pub use transfer::FileTransfer;

/// Russh-related error type - wraps russh::Error for the client `Handler` trait
#[cfg(feature = "russh")]
#[derive(Debug)]
pub struct RusshError(pub ::russh::Error);

#[cfg(feature = "russh")]
impl From<::russh::Error> for RusshError {
    fn from(err: ::russh::Error) -> Self {
        RusshError(err)
    }
}

#[cfg(feature = "russh")]
impl std::fmt::Display for RusshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Russh error: {}", self.0)
    }
}

#[cfg(feature = "russh")]
impl std::error::Error for RusshError {}

/// Errors that can occur during connection operations.
///
/// Every variant names the host identity (`user@address:port`) it concerns.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to reach the host or complete the SSH handshake.
    #[error("Connection to {host} failed: {message}")]
    ConnectionFailed { host: String, message: String },

    /// The server rejected our credential.
    #[error("Authentication to {host} failed: {message}")]
    AuthenticationFailed { host: String, message: String },

    /// The server presented a host key we refuse to trust.
    #[error("Host key for {host} rejected: {message}")]
    HostKeyRejected { host: String, message: String },

    /// A channel could not be opened or a command could not be started.
    #[error("Command execution on {host} failed: {message}")]
    ExecutionFailed { host: String, message: String },

    /// SFTP open, write or close failed.
    #[error("File transfer to {host} failed: {message}")]
    TransferFailed { host: String, message: String },

    /// TCP connect did not finish in time.
    #[error("Connection to {host} timed out after {secs} seconds")]
    Timeout { host: String, secs: u64 },

    /// The session is not connected (never connected, or already closed).
    #[error("Not connected to {0}")]
    NotConnected(String),

    /// `connect` was called on a session that is already connected.
    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    /// Configuration is invalid or incomplete.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Upload failures reported by [`FileTransfer`].
#[derive(Error, Debug)]
pub enum TransferError {
    /// The local source is absent or not a regular file.
    #[error("Local file does not exist or is not a regular file: {}", .0.display())]
    LocalFileMissing(PathBuf),

    /// The remote write failed.
    #[error("Failed to upload to {remote_path}: {source}")]
    Failed {
        remote_path: String,
        #[source]
        source: ConnectionError,
    },
}

/// The result of executing a command on a connection.
///
/// A non-zero exit code is data, not an error; callers decide what it means.
///
/// # Example
///
/// ```rust
/// use deploymate::connection::CommandResult;
///
/// let result = CommandResult::success("Hello".into(), String::new());
/// assert!(result.success);
/// assert_eq!(result.exit_code, 0);
///
/// let failed = CommandResult::failure(1, String::new(), "error".into());
/// assert!(!failed.success);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code of the command (0 indicates success).
    pub exit_code: i32,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
    /// Convenience flag: `true` if `exit_code == 0`.
    pub success: bool,
}

impl CommandResult {
    /// Create a new successful command result
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr,
            success: true,
        }
    }

    /// Create a new failed command result
    pub fn failure(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: false,
        }
    }

    /// Build a result from an exit code
    pub fn from_exit(exit_code: i32, stdout: String, stderr: String) -> Self {
        if exit_code == 0 {
            Self::success(stdout, stderr)
        } else {
            Self::failure(exit_code, stdout, stderr)
        }
    }

    /// Get the combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// An authenticated session to one remote host.
///
/// At most one command runs on a session at a time; the engine never
/// overlaps work on the same host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Connection identity: `user@address:port`
    fn identifier(&self) -> &str;

    /// Login user of the session
    fn remote_user(&self) -> &str;

    /// Check if the connection is still usable
    async fn is_alive(&self) -> bool;

    /// Run a shell command and wait for it to finish
    async fn execute(&self, command: &str) -> ConnectionResult<CommandResult>;

    /// Copy a local file to `remote_path` with the login user's permissions
    async fn upload(&self, local_path: &Path, remote_path: &Path) -> ConnectionResult<()>;

    /// Close the session; closing twice is harmless
    async fn close(&self) -> ConnectionResult<()>;
}

/// Quote a value for a POSIX shell
pub fn quote(value: &str) -> String {
    shell_words::quote(value).into_owned()
}
