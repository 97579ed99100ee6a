//! File handler - create, overwrite, delete and upload remote files
//!
//! Uploads use two phases because the login user usually cannot write the
//! destination directly:
//!
//! 1. the local file is copied over SFTP to a staging path the login user owns
//!    (`staging_dir/<basename>`, the user's home directory by default)
//! 2. an escalated `mv` puts it in place
//!
//! A failed move is an error even though the copy succeeded. The staged file
//! is then removed on a best-effort basis.

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::{
    de_scalar, de_scalar_list, parse_params, required, run, warn_on_failure, BecomeMethod,
    DirectoryHandler, DirectoryTask, HandlerError, HandlerFailure, HandlerResult,
    ResourceHandler, ResourceType,
};
use crate::connection::{quote, Connection, FileTransfer};

const KIND: ResourceType = ResourceType::File;

#[derive(Debug, Deserialize)]
struct FileParams {
    #[serde(default, deserialize_with = "de_scalar")]
    action: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    file_path: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    content: Option<String>,
    #[serde(default, deserialize_with = "de_scalar_list")]
    files: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_scalar")]
    remote_path: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    local_path: Option<String>,
}

/// Where uploaded files end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDestination {
    /// Each file keeps its basename inside this directory
    Directory(String),
    /// A single file written to exactly this path
    File(String),
}

/// Local sources plus their destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSpec {
    pub sources: Vec<PathBuf>,
    pub destination: UploadDestination,
}

/// A validated file task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTask {
    Create { path: String, content: String },
    Overwrite { path: String, content: String },
    Delete { path: String },
    Upload(UploadSpec),
}

impl FileTask {
    pub fn from_params(params: &Mapping) -> HandlerResult<Self> {
        let raw: FileParams = parse_params(KIND, params)?;
        let action = required(KIND, "action", raw.action)?;

        match action.as_str() {
            "create" | "overwrite" => {
                let path = required(KIND, "file_path", raw.file_path)?;
                let content = raw.content.unwrap_or_default();
                Ok(if action == "create" {
                    FileTask::Create { path, content }
                } else {
                    FileTask::Overwrite { path, content }
                })
            }
            "delete" => Ok(FileTask::Delete {
                path: required(KIND, "file_path", raw.file_path)?,
            }),
            "upload" => {
                let spec = match (raw.files.filter(|f| !f.is_empty()), raw.local_path) {
                    (Some(files), _) => UploadSpec {
                        sources: files.into_iter().map(PathBuf::from).collect(),
                        destination: UploadDestination::Directory(required(
                            KIND,
                            "remote_path",
                            raw.remote_path,
                        )?),
                    },
                    (None, Some(local)) => UploadSpec {
                        sources: vec![PathBuf::from(local)],
                        destination: UploadDestination::File(required(
                            KIND,
                            "file_path",
                            raw.file_path,
                        )?),
                    },
                    (None, None) => return Err(HandlerError::missing(KIND, "files")),
                };
                Ok(FileTask::Upload(spec))
            }
            other => Err(HandlerError::invalid_action(KIND, other)),
        }
    }
}

/// Remote file management, delegating directory creation to a [`DirectoryHandler`]
#[derive(Debug, Clone)]
pub struct FileHandler {
    become_method: BecomeMethod,
    directory: DirectoryHandler,
    files_dir: PathBuf,
    staging_dir: Option<String>,
}

impl FileHandler {
    /// `files_dir` anchors relative upload sources; `staging_dir` overrides
    /// the login user's home as the staging location.
    pub fn new(
        become_method: BecomeMethod,
        files_dir: impl Into<PathBuf>,
        staging_dir: Option<String>,
    ) -> Self {
        Self {
            become_method,
            directory: DirectoryHandler::new(become_method),
            files_dir: files_dir.into(),
            staging_dir,
        }
    }

    fn staging_dir(&self, connection: &dyn Connection) -> String {
        match &self.staging_dir {
            Some(dir) => dir.trim_end_matches('/').to_string(),
            None => match connection.remote_user() {
                "root" => "/root".to_string(),
                user => format!("/home/{}", user),
            },
        }
    }

    fn resolve_source(&self, source: &Path) -> PathBuf {
        if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.files_dir.join(source)
        }
    }

    async fn ensure_directory(&self, connection: &dyn Connection, path: &str) -> HandlerResult<()> {
        if path.is_empty() || path == "/" {
            return Ok(());
        }
        let task = DirectoryTask::Create {
            path: path.to_string(),
        };
        self.directory
            .execute(&task, connection)
            .await
            .map_err(|e| HandlerError::new(KIND, HandlerFailure::Delegated(Box::new(e))))
    }

    async fn write_content(
        &self,
        connection: &dyn Connection,
        path: &str,
        content: &str,
    ) -> HandlerResult<()> {
        self.ensure_directory(connection, parent_dir(path)).await?;
        let command = format!(
            "printf '%s\\n' {} | {} > /dev/null",
            quote(content),
            self.become_method.wrap(&format!("tee {}", quote(path)))
        );
        let result = run(KIND, connection, &command).await?;
        warn_on_failure(KIND, connection, &command, &result);
        Ok(())
    }

    async fn upload(&self, connection: &dyn Connection, spec: &UploadSpec) -> HandlerResult<()> {
        let target_dir = match &spec.destination {
            UploadDestination::Directory(dir) => dir.trim_end_matches('/'),
            UploadDestination::File(path) => parent_dir(path),
        };
        self.ensure_directory(connection, target_dir).await?;

        let staging_dir = self.staging_dir(connection);
        for source in &spec.sources {
            let local = self.resolve_source(source);
            let basename = local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    HandlerError::new(
                        KIND,
                        HandlerFailure::InvalidParameters(format!(
                            "upload source '{}' has no file name",
                            source.display()
                        )),
                    )
                })?;

            let staged = format!("{}/{}", staging_dir, basename);
            let destination = match &spec.destination {
                UploadDestination::Directory(_) => format!("{}/{}", target_dir, basename),
                UploadDestination::File(path) => path.clone(),
            };

            FileTransfer::new(connection)
                .upload(&local, Path::new(&staged))
                .await
                .map_err(|e| HandlerError::new(KIND, e))?;
            debug!(host = %connection.identifier(), staged = %staged, "File staged");

            self.move_into_place(connection, &staged, &destination)
                .await?;
        }
        Ok(())
    }

    async fn move_into_place(
        &self,
        connection: &dyn Connection,
        staged: &str,
        destination: &str,
    ) -> HandlerResult<()> {
        let command = self
            .become_method
            .wrap(&format!("mv {} {}", quote(staged), quote(destination)));
        let result = run(KIND, connection, &command).await?;
        if result.success {
            info!(host = %connection.identifier(), destination = %destination, "File moved into place");
            return Ok(());
        }

        error!(
            host = %connection.identifier(),
            staged = %staged,
            destination = %destination,
            exit_code = result.exit_code,
            stdout = %result.stdout.trim(),
            stderr = %result.stderr.trim(),
            "Failed to move staged file"
        );

        let cleanup = format!("rm -f {}", quote(staged));
        match connection.execute(&cleanup).await {
            Ok(r) if r.success => debug!(staged = %staged, "Removed staged file"),
            Ok(r) => warn!(staged = %staged, exit_code = r.exit_code, "Could not remove staged file"),
            Err(e) => warn!(staged = %staged, error = %e, "Could not remove staged file"),
        }

        Err(HandlerError::new(
            KIND,
            HandlerFailure::CommandFailed {
                command,
                exit_code: result.exit_code,
                stderr: result.stderr,
            },
        ))
    }
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new(BecomeMethod::default(), "config/files_to_upload", None)
    }
}

#[async_trait]
impl ResourceHandler for FileHandler {
    type Task = FileTask;

    fn kind(&self) -> ResourceType {
        KIND
    }

    async fn execute(&self, task: &FileTask, connection: &dyn Connection) -> HandlerResult<()> {
        match task {
            FileTask::Create { path, content } => {
                self.write_content(connection, path, content).await?;
                info!(host = %connection.identifier(), path = %path, "File created");
            }
            FileTask::Overwrite { path, content } => {
                self.write_content(connection, path, content).await?;
                info!(host = %connection.identifier(), path = %path, "File overwritten");
            }
            FileTask::Delete { path } => {
                let command = self.become_method.wrap(&format!("rm -f {}", quote(path)));
                let result = run(KIND, connection, &command).await?;
                warn_on_failure(KIND, connection, &command, &result);
                info!(host = %connection.identifier(), path = %path, "File deleted");
            }
            FileTask::Upload(spec) => self.upload(connection, spec).await?,
        }
        Ok(())
    }
}

/// Parent directory of a remote path, `""` when there is none
fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/srv/app/config.txt"), "/srv/app");
        assert_eq!(parent_dir("/motd"), "/");
        assert_eq!(parent_dir("notes.txt"), "");
    }

    #[test]
    fn test_create_defaults_to_empty_content() {
        let task = FileTask::from_params(&params("action: create\nfile_path: /etc/x")).unwrap();
        assert_eq!(
            task,
            FileTask::Create {
                path: "/etc/x".into(),
                content: String::new()
            }
        );
    }

    #[test]
    fn test_scalar_content_is_text() {
        let task = FileTask::from_params(&params(
            "action: overwrite\nfile_path: /etc/app/port\ncontent: 8080",
        ))
        .unwrap();
        assert_eq!(
            task,
            FileTask::Overwrite {
                path: "/etc/app/port".into(),
                content: "8080".into()
            }
        );
    }

    #[test]
    fn test_upload_forms() {
        let task = FileTask::from_params(&params(
            "action: upload\nfiles: [a.conf, b.conf]\nremote_path: /etc/app",
        ))
        .unwrap();
        assert_eq!(
            task,
            FileTask::Upload(UploadSpec {
                sources: vec![PathBuf::from("a.conf"), PathBuf::from("b.conf")],
                destination: UploadDestination::Directory("/etc/app".into()),
            })
        );

        let task = FileTask::from_params(&params(
            "action: upload\nlocal_path: app.conf\nfile_path: /etc/app/app.conf",
        ))
        .unwrap();
        assert!(matches!(
            task,
            FileTask::Upload(UploadSpec {
                destination: UploadDestination::File(_),
                ..
            })
        ));
    }

    #[test]
    fn test_upload_requires_destination() {
        let err = FileTask::from_params(&params("action: upload\nfiles: [a.conf]")).unwrap_err();
        assert!(matches!(
            err.reason,
            HandlerFailure::MissingParameter("remote_path")
        ));

        let err = FileTask::from_params(&params("action: upload")).unwrap_err();
        assert!(matches!(err.reason, HandlerFailure::MissingParameter("files")));
    }

    #[test]
    fn test_resolve_source() {
        let handler = FileHandler::new(BecomeMethod::Sudo, "/opt/dm/files", None);
        assert_eq!(
            handler.resolve_source(Path::new("app.conf")),
            PathBuf::from("/opt/dm/files/app.conf")
        );
        assert_eq!(
            handler.resolve_source(Path::new("/tmp/app.conf")),
            PathBuf::from("/tmp/app.conf")
        );
    }
}
