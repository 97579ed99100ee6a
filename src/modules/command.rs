//! Command handler - run a shell command verbatim
//!
//! A task without a `command` is logged and skipped rather than rejected.

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tracing::{error, info, warn};

use super::{de_scalar, parse_params, run, HandlerResult, ResourceHandler, ResourceType};
use crate::connection::Connection;

const KIND: ResourceType = ResourceType::Command;

#[derive(Debug, Deserialize)]
struct CommandParams {
    #[serde(default, deserialize_with = "de_scalar")]
    command: Option<String>,
}

/// A validated command task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTask {
    /// The command line, passed to the remote shell as-is
    pub command: Option<String>,
}

impl CommandTask {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
        }
    }

    pub fn from_params(params: &Mapping) -> HandlerResult<Self> {
        let raw: CommandParams = parse_params(KIND, params)?;
        Ok(Self {
            command: raw.command.filter(|c| !c.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

#[async_trait]
impl ResourceHandler for CommandHandler {
    type Task = CommandTask;

    fn kind(&self) -> ResourceType {
        KIND
    }

    async fn execute(&self, task: &CommandTask, connection: &dyn Connection) -> HandlerResult<()> {
        let Some(command) = task.command.as_deref() else {
            error!(host = %connection.identifier(), "No command specified in the task");
            return Ok(());
        };

        info!(host = %connection.identifier(), command = %command, "Executing command");
        let result = run(KIND, connection, command).await?;

        if !result.stdout.trim().is_empty() {
            info!(host = %connection.identifier(), "Command output: {}", result.stdout.trim_end());
        }
        if !result.stderr.trim().is_empty() {
            info!(host = %connection.identifier(), "Command error output: {}", result.stderr.trim_end());
        }
        if !result.success {
            warn!(
                host = %connection.identifier(),
                command = %command,
                exit_code = result.exit_code,
                "Command exited non-zero"
            );
        }
        Ok(())
    }
}
