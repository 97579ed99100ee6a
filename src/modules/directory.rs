//! Directory handler - create and remove remote directories

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tracing::{debug, info};

use super::{
    de_scalar, parse_params, required, run, warn_on_failure, BecomeMethod, HandlerError,
    HandlerResult, ResourceHandler, ResourceType,
};
use crate::connection::{quote, Connection};

const KIND: ResourceType = ResourceType::Directory;

#[derive(Debug, Deserialize)]
struct DirectoryParams {
    #[serde(default, deserialize_with = "de_scalar")]
    action: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    directory_path: Option<String>,
}

/// A validated directory task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryTask {
    /// `mkdir -p` with escalation
    Create { path: String },
    /// recursive remove as the login user
    Delete { path: String },
}

impl DirectoryTask {
    pub fn from_params(params: &Mapping) -> HandlerResult<Self> {
        let raw: DirectoryParams = parse_params(KIND, params)?;
        let action = required(KIND, "action", raw.action)?;
        if action != "create" && action != "delete" {
            return Err(HandlerError::invalid_action(KIND, &action));
        }
        let path = required(KIND, "directory_path", raw.directory_path)?;
        if path.trim().is_empty() {
            return Err(HandlerError::missing(KIND, "directory_path"));
        }
        Ok(if action == "create" {
            DirectoryTask::Create { path }
        } else {
            DirectoryTask::Delete { path }
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryHandler {
    become_method: BecomeMethod,
}

impl DirectoryHandler {
    pub fn new(become_method: BecomeMethod) -> Self {
        Self { become_method }
    }

    fn command(&self, task: &DirectoryTask) -> String {
        match task {
            DirectoryTask::Create { path } => {
                self.become_method.wrap(&format!("mkdir -p {}", quote(path)))
            }
            DirectoryTask::Delete { path } => format!("rm -r {}", quote(path)),
        }
    }
}

#[async_trait]
impl ResourceHandler for DirectoryHandler {
    type Task = DirectoryTask;

    fn kind(&self) -> ResourceType {
        KIND
    }

    async fn execute(
        &self,
        task: &DirectoryTask,
        connection: &dyn Connection,
    ) -> HandlerResult<()> {
        let command = self.command(task);
        debug!(host = %connection.identifier(), command = %command, "Running directory command");
        let result = run(KIND, connection, &command).await?;
        warn_on_failure(KIND, connection, &command, &result);
        info!(host = %connection.identifier(), task = ?task, "Directory task applied");
        Ok(())
    }
}
