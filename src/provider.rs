//! Playbook and inventory sources
//!
//! The engine only sees parsed [`Playbook`] and [`Inventory`] values; where
//! they come from is behind [`DataProvider`]. [`YamlDataProvider`] reads the
//! two YAML documents from disk.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ParseError;
use crate::inventory::Inventory;
use crate::playbook::Playbook;

/// Source of the two input documents
#[async_trait]
pub trait DataProvider: Send + Sync + fmt::Debug {
    /// Provider name, for logs
    fn name(&self) -> &str;

    /// Read and validate a playbook
    async fn parse_playbook(&self, path: &Path) -> Result<Playbook, ParseError>;

    /// Read and validate an inventory
    async fn parse_inventory(&self, path: &Path) -> Result<Inventory, ParseError>;
}

/// Reads YAML documents from the local filesystem
#[derive(Debug, Clone)]
pub struct YamlDataProvider {
    key_dir: PathBuf,
}

impl YamlDataProvider {
    /// `key_dir` anchors relative `key_file` paths in the inventory
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }
}

#[async_trait]
impl DataProvider for YamlDataProvider {
    fn name(&self) -> &str {
        "yaml"
    }

    async fn parse_playbook(&self, path: &Path) -> Result<Playbook, ParseError> {
        let playbook = Playbook::from_file(path).await?;
        debug!(
            path = %path.display(),
            tasks = playbook.task_count(),
            "Parsed playbook"
        );
        Ok(playbook)
    }

    async fn parse_inventory(&self, path: &Path) -> Result<Inventory, ParseError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ParseError::new(path, format!("Failed to read file: {}", e)))?;
        let inventory = Inventory::from_yaml(&content, path, &self.key_dir)?;
        debug!(path = %path.display(), hosts = inventory.len(), "Parsed inventory");
        Ok(inventory)
    }
}
