//! Playbook definitions and parsing.
//!
//! A playbook is a single ordered list of tasks:
//!
//! ```yaml
//! tasks:
//!   - name: Install nginx
//!     type: package
//!     action: install
//!     package_name: nginx
//!     hosts: [web1]
//!   - name: Restart nginx
//!     type: service
//!     action: restart
//!     service_name: nginx
//! ```
//!
//! Task order is application order across the whole run.

pub mod task;

pub use task::{HostSelection, Task, ALL_HOSTS};

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ParseError;
use task::TaskDocument;

#[derive(Debug, Deserialize)]
struct PlaybookDocument {
    tasks: Option<Vec<TaskDocument>>,
}

/// An ordered sequence of tasks
#[derive(Debug, Default)]
pub struct Playbook {
    /// Name of the playbook, derived from the file name when loaded from disk
    pub name: Option<String>,
    pub tasks: Vec<Task>,
    /// Path to the playbook file (set during loading)
    pub source_path: Option<PathBuf>,
}

impl Playbook {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            name: None,
            tasks,
            source_path: None,
        }
    }

    /// Loads a playbook from a YAML file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ParseError::new(path, format!("Failed to read file: {}", e)))?;

        let mut playbook = Self::from_yaml(&content, path)?;
        playbook.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string());
        playbook.source_path = Some(path.to_path_buf());
        Ok(playbook)
    }

    /// Parses a playbook from a YAML string; `source` is used in error messages.
    ///
    /// Structural problems (not a mapping, no `tasks`, a task that is not a
    /// mapping) are parse errors. Missing or unknown types and bad parameters
    /// are not: they stay on the task and surface when it is dispatched.
    pub fn from_yaml(yaml: &str, source: &Path) -> Result<Self, ParseError> {
        let document: PlaybookDocument = serde_yaml::from_str(yaml)
            .map_err(|e| ParseError::new(source, format!("invalid playbook: {}", e)))?;

        let documents = document
            .tasks
            .ok_or_else(|| ParseError::new(source, "missing top-level 'tasks'"))?;

        let tasks = documents
            .into_iter()
            .enumerate()
            .map(|(idx, doc)| Task::from_document(doc, idx))
            .collect();

        Ok(Self::new(tasks))
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks whose body failed validation
    pub fn invalid_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.is_valid())
    }
}
