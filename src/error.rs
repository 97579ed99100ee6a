//! Error types for DeployMate.
//!
//! Each layer owns a `thiserror` enum ([`ConnectionError`], [`TransferError`],
//! [`HandlerError`]); this module defines the document-level [`ParseError`] and
//! the crate-wide [`Error`] that the engine catches at (task, host) granularity.

use std::path::PathBuf;
use thiserror::Error;

use crate::connection::{ConnectionError, TransferError};
use crate::modules::HandlerError;

/// Result type alias for DeployMate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A playbook or inventory document could not be read or understood.
///
/// Always fatal: it aborts the run before any connection is opened.
#[derive(Error, Debug)]
#[error("Failed to parse '{path}': {message}")]
pub struct ParseError {
    /// Path of the offending document
    pub path: PathBuf,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error for `path`.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The main error type for DeployMate.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing playbook/inventory.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Authentication or transport failure for one host.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Upload failure.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A task names a resource type no handler exists for.
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// A resource handler rejected its parameters or failed downstream.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}
