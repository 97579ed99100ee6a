//! Handler registry
//!
//! Maps a resource type to a fresh handler. Handlers hold only injected
//! settings, so creating one per dispatch is cheap.

use std::path::PathBuf;

use super::{
    BecomeMethod, CommandHandler, DirectoryHandler, FileHandler, HandlerError, HandlerFailure,
    HandlerResult, PackageHandler, Resource, ResourceHandler, ResourceType, ServiceHandler,
    UpdateHandler,
};
use crate::connection::Connection;
use crate::error::Result;

/// Settings injected into handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub become_method: BecomeMethod,
    /// Local directory relative upload sources resolve against
    pub files_dir: PathBuf,
    /// Remote staging directory for uploads, the login user's home when unset
    pub staging_dir: Option<String>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            become_method: BecomeMethod::Sudo,
            files_dir: PathBuf::from("config/files_to_upload"),
            staging_dir: None,
        }
    }
}

/// One handler of each resource type
#[derive(Debug, Clone)]
pub enum Handler {
    Package(PackageHandler),
    File(FileHandler),
    Directory(DirectoryHandler),
    Service(ServiceHandler),
    Update(UpdateHandler),
    Command(CommandHandler),
}

impl Handler {
    pub fn kind(&self) -> ResourceType {
        match self {
            Handler::Package(h) => h.kind(),
            Handler::File(h) => h.kind(),
            Handler::Directory(h) => h.kind(),
            Handler::Service(h) => h.kind(),
            Handler::Update(h) => h.kind(),
            Handler::Command(h) => h.kind(),
        }
    }

    /// Apply a validated task. The task must be of this handler's type.
    pub async fn apply(&self, resource: &Resource, connection: &dyn Connection) -> HandlerResult<()> {
        match (self, resource) {
            (Handler::Package(h), Resource::Package(t)) => h.execute(t, connection).await,
            (Handler::File(h), Resource::File(t)) => h.execute(t, connection).await,
            (Handler::Directory(h), Resource::Directory(t)) => h.execute(t, connection).await,
            (Handler::Service(h), Resource::Service(t)) => h.execute(t, connection).await,
            (Handler::Update(h), Resource::Update(t)) => h.execute(t, connection).await,
            (Handler::Command(h), Resource::Command(t)) => h.execute(t, connection).await,
            (handler, resource) => Err(HandlerError::new(
                handler.kind(),
                HandlerFailure::InvalidParameters(format!(
                    "{} task given to {} handler",
                    resource.kind(),
                    handler.kind()
                )),
            )),
        }
    }
}

/// Creates handlers by resource type
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    settings: HandlerSettings,
}

impl HandlerRegistry {
    pub fn new(settings: HandlerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Create the handler for `kind`
    pub fn create(&self, kind: ResourceType) -> Handler {
        let become_method = self.settings.become_method;
        match kind {
            ResourceType::Package => Handler::Package(PackageHandler::new(become_method)),
            ResourceType::File => Handler::File(FileHandler::new(
                become_method,
                self.settings.files_dir.clone(),
                self.settings.staging_dir.clone(),
            )),
            ResourceType::Directory => Handler::Directory(DirectoryHandler::new(become_method)),
            ResourceType::Service => Handler::Service(ServiceHandler::new(become_method)),
            ResourceType::Update => Handler::Update(UpdateHandler::new(become_method)),
            ResourceType::Command => Handler::Command(CommandHandler),
        }
    }

    /// Create the handler for a playbook tag, failing on unknown tags
    pub fn create_for_tag(&self, tag: &str) -> Result<Handler> {
        Ok(self.create(tag.parse()?))
    }
}
