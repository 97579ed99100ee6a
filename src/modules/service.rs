//! Service handler - systemd service management

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tracing::info;

use super::{
    de_scalar, parse_params, required, run, warn_on_failure, BecomeMethod, HandlerError,
    HandlerResult, ResourceHandler, ResourceType,
};
use crate::connection::{quote, Connection};

const KIND: ResourceType = ResourceType::Service;

#[derive(Debug, Deserialize)]
struct ServiceParams {
    #[serde(default, deserialize_with = "de_scalar")]
    action: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    service_name: Option<String>,
}

/// Desired operation on a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        }
    }
}

/// A validated service task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTask {
    pub action: ServiceAction,
    pub service: String,
}

impl ServiceTask {
    pub fn from_params(params: &Mapping) -> HandlerResult<Self> {
        let raw: ServiceParams = parse_params(KIND, params)?;
        let action = match required(KIND, "action", raw.action)?.as_str() {
            "start" => ServiceAction::Start,
            "stop" => ServiceAction::Stop,
            "restart" => ServiceAction::Restart,
            other => return Err(HandlerError::invalid_action(KIND, other)),
        };
        let service = required(KIND, "service_name", raw.service_name)?;
        Ok(Self { action, service })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceHandler {
    become_method: BecomeMethod,
}

impl ServiceHandler {
    pub fn new(become_method: BecomeMethod) -> Self {
        Self { become_method }
    }
}

#[async_trait]
impl ResourceHandler for ServiceHandler {
    type Task = ServiceTask;

    fn kind(&self) -> ResourceType {
        KIND
    }

    async fn execute(&self, task: &ServiceTask, connection: &dyn Connection) -> HandlerResult<()> {
        let command = self.become_method.wrap(&format!(
            "systemctl {} {}",
            task.action.as_str(),
            quote(&task.service)
        ));
        let result = run(KIND, connection, &command).await?;
        warn_on_failure(KIND, connection, &command, &result);
        info!(
            host = %connection.identifier(),
            service = %task.service,
            action = task.action.as_str(),
            "Service task applied"
        );
        Ok(())
    }
}
