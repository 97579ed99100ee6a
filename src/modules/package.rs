//! Package handler - apt package management
//!
//! `install` and `update` are one privileged invocation each. `remove` purges
//! the package and then runs autoremove; only a failed purge is an error.

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tracing::{debug, error, info, warn};

use super::{
    de_scalar, parse_params, required, run, warn_on_failure, BecomeMethod, HandlerError,
    HandlerFailure, HandlerResult, ResourceHandler, ResourceType,
};
use crate::connection::{quote, Connection};

const KIND: ResourceType = ResourceType::Package;

#[derive(Debug, Deserialize)]
struct PackageParams {
    #[serde(default, deserialize_with = "de_scalar")]
    action: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    package_name: Option<String>,
}

/// A validated package task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageTask {
    Install { package: String },
    Update { package: String },
    Remove { package: String },
}

impl PackageTask {
    pub fn from_params(params: &Mapping) -> HandlerResult<Self> {
        let raw: PackageParams = parse_params(KIND, params)?;
        let action = required(KIND, "action", raw.action)?;
        if !matches!(action.as_str(), "install" | "update" | "remove") {
            return Err(HandlerError::invalid_action(KIND, &action));
        }
        let package = required(KIND, "package_name", raw.package_name)?;
        Ok(match action.as_str() {
            "install" => PackageTask::Install { package },
            "update" => PackageTask::Update { package },
            _ => PackageTask::Remove { package },
        })
    }

    pub fn package(&self) -> &str {
        match self {
            PackageTask::Install { package }
            | PackageTask::Update { package }
            | PackageTask::Remove { package } => package,
        }
    }
}

/// Installs, upgrades and purges packages with apt-get
#[derive(Debug, Clone, Default)]
pub struct PackageHandler {
    become_method: BecomeMethod,
}

impl PackageHandler {
    pub fn new(become_method: BecomeMethod) -> Self {
        Self { become_method }
    }

    async fn remove(&self, connection: &dyn Connection, package: &str) -> HandlerResult<()> {
        let purge = self
            .become_method
            .wrap(&format!("apt-get purge -y {}", quote(package)));
        let result = run(KIND, connection, &purge).await?;
        if !result.success {
            error!(
                host = %connection.identifier(),
                package = %package,
                exit_code = result.exit_code,
                stdout = %result.stdout.trim(),
                stderr = %result.stderr.trim(),
                "Failed to purge package"
            );
            return Err(HandlerError::new(
                KIND,
                HandlerFailure::CommandFailed {
                    command: purge,
                    exit_code: result.exit_code,
                    stderr: result.stderr,
                },
            ));
        }
        info!(host = %connection.identifier(), package = %package, "Package purged");

        let autoremove = self.become_method.wrap("apt-get autoremove -y");
        let result = run(KIND, connection, &autoremove).await?;
        if result.success {
            debug!(host = %connection.identifier(), "Autoremove executed");
        } else {
            // the package itself is already gone
            warn!(
                host = %connection.identifier(),
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "Autoremove failed"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for PackageHandler {
    type Task = PackageTask;

    fn kind(&self) -> ResourceType {
        KIND
    }

    async fn execute(&self, task: &PackageTask, connection: &dyn Connection) -> HandlerResult<()> {
        let package = quote(task.package());
        let command = match task {
            PackageTask::Install { .. } => self
                .become_method
                .wrap(&format!("apt-get install -y {}", package)),
            PackageTask::Update { .. } => format!(
                "{} && {}",
                self.become_method.wrap("apt-get update"),
                self.become_method
                    .wrap(&format!("apt-get install --only-upgrade -y {}", package))
            ),
            PackageTask::Remove { package } => return self.remove(connection, package).await,
        };

        let result = run(KIND, connection, &command).await?;
        warn_on_failure(KIND, connection, &command, &result);
        debug!(stdout = %result.stdout.trim(), stderr = %result.stderr.trim(), "apt-get output");
        info!(host = %connection.identifier(), package = %task.package(), "Package task applied");
        Ok(())
    }
}
