//! # DeployMate - Minimal Declarative Remote Configuration
//!
//! DeployMate reads a *playbook* (an ordered list of intents) and an
//! *inventory* (named hosts with SSH credentials), opens one SSH session per
//! host and applies every intent to the hosts it targets by translating it
//! into remote shell commands.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │   Playbook (YAML)    │      │   Inventory (YAML)   │
//! └──────────┬───────────┘      └──────────┬───────────┘
//!            └──────────┬──────────────────┘
//!                       ▼  DataProvider
//! ┌─────────────────────────────────────────────────────┐
//! │                  ExecutionEngine                    │
//! │   connect all ─▶ dispatch (task × host) ─▶ drain    │
//! └──────────┬──────────────────────────┬───────────────┘
//!            ▼                          ▼
//! ┌──────────────────────┐   ┌──────────────────────────┐
//! │  ConnectionManager   │   │     HandlerRegistry      │
//! │ (one SSH session per │   │ package file directory   │
//! │        host)         │   │ service update command   │
//! └──────────────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use deploymate::prelude::*;
//!
//! let provider = YamlDataProvider::new("config");
//! let playbook = provider.parse_playbook(Path::new("site.yml")).await?;
//! let inventory = provider.parse_inventory(Path::new("hosts.yml")).await?;
//!
//! let mut connections = ConnectionManager::new(Arc::new(SshConnector::default()));
//! let engine = ExecutionEngine::new(HandlerRegistry::default())
//!     .with_callback(Arc::new(LogCallback::new()));
//! let report = engine.run(&playbook, &inventory, &mut connections).await;
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Connection types
    #[cfg(feature = "russh")]
    pub use crate::connection::RusshConnection;
    pub use crate::connection::{
        CommandResult, Connection, ConnectionConfig, ConnectionError, ConnectionManager,
        ConnectionResult, Connector, FileTransfer, SshConnector, TransferError,
    };

    // Error handling
    pub use crate::error::{Error, ParseError, Result};

    // Execution engine
    pub use crate::executor::{ExecutionEngine, RunPhase, RunReport, TaskStatus};

    // Callbacks
    pub use crate::callback::{
        CallbackSet, ExecutionCallback, LogCallback, NullCallback, RecapCallback,
    };

    // Inventory
    pub use crate::inventory::{Credential, Host, Inventory};

    // Modules
    pub use crate::modules::{
        BecomeMethod, HandlerError, HandlerRegistry, HandlerSettings, Resource, ResourceHandler,
        ResourceType,
    };

    // Playbook
    pub use crate::playbook::{HostSelection, Playbook, Task};

    // Input documents
    pub use crate::provider::{DataProvider, YamlDataProvider};

    // Configuration
    pub use crate::config::Config;

    // Re-export async_trait for implementing Connection, Connector and callbacks
    pub use async_trait::async_trait;
}

/// Error types.
pub mod error;

/// Inventory hosts and credentials.
pub mod inventory;

/// Playbooks and tasks.
pub mod playbook;

/// Playbook and inventory sources.
pub mod provider;

/// SSH sessions, the per-run connection manager and file transfer.
pub mod connection;

/// Resource handlers and the handler registry.
pub mod modules;

/// The execution engine.
pub mod executor;

/// Run event callbacks.
pub mod callback;

/// Layered configuration.
pub mod config;

/// Command-line arguments.
pub mod cli;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
