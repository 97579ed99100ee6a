//! Resource handlers for DeployMate
//!
//! Every task names one of six resource types. A task's parameters are
//! validated into a typed [`Resource`] when the playbook is parsed; at dispatch
//! time the [`HandlerRegistry`] hands it to the matching handler, which turns
//! it into remote shell commands on a [`Connection`].

pub mod command;
pub mod directory;
pub mod file;
pub mod package;
pub mod registry;
pub mod service;
pub mod update;

pub use command::{CommandHandler, CommandTask};
pub use directory::{DirectoryHandler, DirectoryTask};
pub use file::{FileHandler, FileTask, UploadDestination, UploadSpec};
pub use package::{PackageHandler, PackageTask};
pub use registry::{Handler, HandlerRegistry, HandlerSettings};
pub use service::{ServiceAction, ServiceHandler, ServiceTask};
pub use update::{UpdateHandler, UpdateTask};

use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::connection::{CommandResult, Connection, ConnectionError, TransferError};

/// The closed set of resource types a task may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Package,
    File,
    Directory,
    Service,
    Update,
    Command,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Package,
        ResourceType::File,
        ResourceType::Directory,
        ResourceType::Service,
        ResourceType::Update,
        ResourceType::Command,
    ];

    /// The tag used in playbooks
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Package => "package",
            ResourceType::File => "file",
            ResourceType::Directory => "directory",
            ResourceType::Service => "service",
            ResourceType::Update => "update",
            ResourceType::Command => "command",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = crate::error::Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| crate::error::Error::UnknownResourceType(tag.to_string()))
    }
}

/// What went wrong inside a handler
#[derive(Error, Debug)]
pub enum HandlerFailure {
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid or unsupported action '{0}'")]
    InvalidAction(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("command `{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A handler this one delegated to failed
    #[error(transparent)]
    Delegated(Box<HandlerError>),
}

/// Error raised by a resource handler; `kind` names which one
#[derive(Error, Debug)]
#[error("{kind} handler: {reason}")]
pub struct HandlerError {
    pub kind: ResourceType,
    #[source]
    pub reason: HandlerFailure,
}

impl HandlerError {
    pub fn new(kind: ResourceType, reason: impl Into<HandlerFailure>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn missing(kind: ResourceType, param: &'static str) -> Self {
        Self::new(kind, HandlerFailure::MissingParameter(param))
    }

    pub fn invalid_action(kind: ResourceType, action: &str) -> Self {
        Self::new(kind, HandlerFailure::InvalidAction(action.to_string()))
    }
}

/// Result type for handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Privilege escalation wrapper for remote commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BecomeMethod {
    #[default]
    Sudo,
    Doas,
}

impl BecomeMethod {
    pub fn program(&self) -> &'static str {
        match self {
            BecomeMethod::Sudo => "sudo",
            BecomeMethod::Doas => "doas",
        }
    }

    /// Prefix `command` so it runs with elevated privileges
    pub fn wrap(&self, command: &str) -> String {
        format!("{} {}", self.program(), command)
    }
}

impl FromStr for BecomeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sudo" => Ok(BecomeMethod::Sudo),
            "doas" => Ok(BecomeMethod::Doas),
            other => Err(format!("unsupported become method '{}'", other)),
        }
    }
}

/// A validated task body, one variant per resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Package(PackageTask),
    File(FileTask),
    Directory(DirectoryTask),
    Service(ServiceTask),
    Update(UpdateTask),
    Command(CommandTask),
}

impl Resource {
    /// Validate a raw parameter bag for `kind`
    pub fn parse(kind: ResourceType, params: &Mapping) -> HandlerResult<Self> {
        Ok(match kind {
            ResourceType::Package => Resource::Package(PackageTask::from_params(params)?),
            ResourceType::File => Resource::File(FileTask::from_params(params)?),
            ResourceType::Directory => Resource::Directory(DirectoryTask::from_params(params)?),
            ResourceType::Service => Resource::Service(ServiceTask::from_params(params)?),
            ResourceType::Update => Resource::Update(UpdateTask::from_params(params)?),
            ResourceType::Command => Resource::Command(CommandTask::from_params(params)?),
        })
    }

    pub fn kind(&self) -> ResourceType {
        match self {
            Resource::Package(_) => ResourceType::Package,
            Resource::File(_) => ResourceType::File,
            Resource::Directory(_) => ResourceType::Directory,
            Resource::Service(_) => ResourceType::Service,
            Resource::Update(_) => ResourceType::Update,
            Resource::Command(_) => ResourceType::Command,
        }
    }
}

/// Shared contract of the resource handlers
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Typed task this handler applies
    type Task: Send + Sync;

    fn kind(&self) -> ResourceType;

    /// Apply `task` on the host behind `connection`
    async fn execute(&self, task: &Self::Task, connection: &dyn Connection) -> HandlerResult<()>;
}

/// Deserialize a raw parameter bag into a handler's parameter struct
pub(crate) fn parse_params<T: serde::de::DeserializeOwned>(
    kind: ResourceType,
    params: &Mapping,
) -> HandlerResult<T> {
    serde_yaml::from_value(Value::Mapping(params.clone()))
        .map_err(|e| HandlerError::new(kind, HandlerFailure::InvalidParameters(e.to_string())))
}

/// Unwrap a required parameter
pub(crate) fn required<T>(
    kind: ResourceType,
    name: &'static str,
    value: Option<T>,
) -> HandlerResult<T> {
    value.ok_or_else(|| HandlerError::missing(kind, name))
}

/// Text form of a YAML scalar; `None` for null, sequences and mappings
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// `deserialize_with` for optional text parameters.
///
/// Numbers and booleans are accepted and rendered as text, so `content: 8080`
/// reads the same as `content: "8080"`. Null reads as absent.
pub(crate) fn de_scalar<'a, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'a>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => scalar_text(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom("expected a string, number or boolean")),
    }
}

/// `deserialize_with` for optional lists of text parameters.
///
/// A single scalar is read as a one-element list.
pub(crate) fn de_scalar_list<'a, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'a>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_text(item).ok_or_else(|| {
                    de::Error::custom("list items must be strings, numbers or booleans")
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        value => scalar_text(&value)
            .map(|item| Some(vec![item]))
            .ok_or_else(|| de::Error::custom("expected a list of strings")),
    }
}

/// Run one command, turning transport errors into a handler error.
///
/// A non-zero exit is returned to the caller untouched.
pub(crate) async fn run(
    kind: ResourceType,
    connection: &dyn Connection,
    command: &str,
) -> HandlerResult<CommandResult> {
    connection
        .execute(command)
        .await
        .map_err(|e| HandlerError::new(kind, e))
}

/// Log a non-zero exit as a warning; used where failure is not fatal
pub(crate) fn warn_on_failure(
    kind: ResourceType,
    connection: &dyn Connection,
    command: &str,
    result: &CommandResult,
) {
    if !result.success {
        warn!(
            resource = %kind,
            host = %connection.identifier(),
            command = %command,
            exit_code = result.exit_code,
            stderr = %result.stderr.trim(),
            "Remote command returned non-zero exit code"
        );
    }
}
