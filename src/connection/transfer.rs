//! Checked file uploads over an open session.
//!
//! The remote write happens with the login user's permissions; moving the
//! file anywhere privileged is the caller's job.

use std::path::Path;
use tracing::debug;

use super::{Connection, TransferError};

/// Copies local files to one host
pub struct FileTransfer<'a> {
    connection: &'a dyn Connection,
}

impl<'a> FileTransfer<'a> {
    pub fn new(connection: &'a dyn Connection) -> Self {
        Self { connection }
    }

    /// Upload `local_path` to `remote_path`.
    ///
    /// Fails with [`TransferError::LocalFileMissing`] before touching the
    /// network if the source is not a regular file.
    pub async fn upload(&self, local_path: &Path, remote_path: &Path) -> Result<(), TransferError> {
        let is_file = tokio::fs::metadata(local_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(TransferError::LocalFileMissing(local_path.to_path_buf()));
        }

        debug!(
            host = %self.connection.identifier(),
            local = %local_path.display(),
            remote = %remote_path.display(),
            "Transferring file"
        );

        self.connection
            .upload(local_path, remote_path)
            .await
            .map_err(|source| TransferError::Failed {
                remote_path: remote_path.display().to_string(),
                source,
            })
    }
}
