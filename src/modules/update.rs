//! Update handler - package index refresh and full system upgrade

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tracing::info;

use super::{
    de_scalar, parse_params, required, run, warn_on_failure, BecomeMethod, HandlerError,
    HandlerResult, ResourceHandler, ResourceType,
};
use crate::connection::Connection;

const KIND: ResourceType = ResourceType::Update;

#[derive(Debug, Deserialize)]
struct UpdateParams {
    #[serde(default, deserialize_with = "de_scalar")]
    action: Option<String>,
}

/// A validated update task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTask {
    /// Refresh package lists
    Update,
    /// Upgrade every installed package
    Upgrade,
}

impl UpdateTask {
    pub fn from_params(params: &Mapping) -> HandlerResult<Self> {
        let raw: UpdateParams = parse_params(KIND, params)?;
        match required(KIND, "action", raw.action)?.as_str() {
            "update" => Ok(UpdateTask::Update),
            "upgrade" => Ok(UpdateTask::Upgrade),
            other => Err(HandlerError::invalid_action(KIND, other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateHandler {
    become_method: BecomeMethod,
}

impl UpdateHandler {
    pub fn new(become_method: BecomeMethod) -> Self {
        Self { become_method }
    }
}

#[async_trait]
impl ResourceHandler for UpdateHandler {
    type Task = UpdateTask;

    fn kind(&self) -> ResourceType {
        KIND
    }

    async fn execute(&self, task: &UpdateTask, connection: &dyn Connection) -> HandlerResult<()> {
        let (command, done) = match task {
            UpdateTask::Update => ("apt-get update", "Package lists updated"),
            UpdateTask::Upgrade => ("apt-get upgrade -y", "Installed packages upgraded"),
        };
        let command = self.become_method.wrap(command);
        let result = run(KIND, connection, &command).await?;
        warn_on_failure(KIND, connection, &command, &result);
        info!(host = %connection.identifier(), "{}", done);
        Ok(())
    }
}
