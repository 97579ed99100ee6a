//! Shared test utilities for DeployMate integration tests.
//!
//! - [`MockConnection`]: records commands and uploads, with scripted results
//! - [`MockConnector`]: hands out mock sessions, with per-host failures
//! - [`RecordingCallback`]: captures engine events as strings
//! - fixture helpers for inventories and playbooks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use deploymate::callback::ExecutionCallback;
use deploymate::connection::{
    CommandResult, Connection, ConnectionError, ConnectionManager, ConnectionResult, Connector,
};
use deploymate::error::Error;
use deploymate::executor::{RunPhase, RunReport, SkipReason};
use deploymate::inventory::{Host, Inventory};
use deploymate::playbook::Playbook;

/// One thing a mock session was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Execute(String),
    Upload { local: PathBuf, remote: PathBuf },
}

/// A session that never touches the network.
///
/// Commands succeed with empty output unless a result was scripted for the
/// exact command string.
#[derive(Debug)]
pub struct MockConnection {
    identifier: String,
    user: String,
    alive: AtomicBool,
    operations: RwLock<Vec<Operation>>,
    command_results: RwLock<HashMap<String, CommandResult>>,
    default_result: RwLock<CommandResult>,
    should_fail: AtomicBool,
    upload_fails: AtomicBool,
    close_count: AtomicU32,
}

impl MockConnection {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            user: "ops".to_string(),
            alive: AtomicBool::new(true),
            operations: RwLock::new(Vec::new()),
            command_results: RwLock::new(HashMap::new()),
            default_result: RwLock::new(CommandResult::success(String::new(), String::new())),
            should_fail: AtomicBool::new(false),
            upload_fails: AtomicBool::new(false),
            close_count: AtomicU32::new(0),
        }
    }

    /// Mock session for an inventory host
    pub fn for_host(host: &Host) -> Self {
        Self::new(host.identity()).with_user(&host.user)
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    /// Set the result for a specific command
    pub fn set_command_result(&self, command: impl Into<String>, result: CommandResult) {
        self.command_results.write().insert(command.into(), result);
    }

    /// Set the result for commands not explicitly configured
    pub fn set_default_result(&self, result: CommandResult) {
        *self.default_result.write() = result;
    }

    /// Make every execute call fail at the transport level
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Make every upload fail at the transport level
    pub fn set_upload_fails(&self, fails: bool) {
        self.upload_fails.store(fails, Ordering::SeqCst);
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations.read().clone()
    }

    /// Executed commands, in order
    pub fn commands(&self) -> Vec<String> {
        self.operations
            .read()
            .iter()
            .filter_map(|op| match op {
                Operation::Execute(cmd) => Some(cmd.clone()),
                Operation::Upload { .. } => None,
            })
            .collect()
    }

    /// Uploads as (local, remote) pairs, in order
    pub fn uploads(&self) -> Vec<(PathBuf, PathBuf)> {
        self.operations
            .read()
            .iter()
            .filter_map(|op| match op {
                Operation::Upload { local, remote } => Some((local.clone(), remote.clone())),
                Operation::Execute(_) => None,
            })
            .collect()
    }

    pub fn command_count(&self) -> usize {
        self.commands().len()
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn was_command_executed(&self, command: &str) -> bool {
        self.commands().iter().any(|c| c == command)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn remote_user(&self) -> &str {
        &self.user
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn execute(&self, command: &str) -> ConnectionResult<CommandResult> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected(self.identifier.clone()));
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ConnectionError::ExecutionFailed {
                host: self.identifier.clone(),
                message: "mock execution failure".to_string(),
            });
        }

        self.operations
            .write()
            .push(Operation::Execute(command.to_string()));

        if let Some(result) = self.command_results.read().get(command) {
            return Ok(result.clone());
        }
        Ok(self.default_result.read().clone())
    }

    async fn upload(&self, local_path: &Path, remote_path: &Path) -> ConnectionResult<()> {
        if self.upload_fails.load(Ordering::SeqCst) {
            return Err(ConnectionError::TransferFailed {
                host: self.identifier.clone(),
                message: "mock sftp failure".to_string(),
            });
        }
        self.operations.write().push(Operation::Upload {
            local: local_path.to_path_buf(),
            remote: remote_path.to_path_buf(),
        });
        Ok(())
    }

    async fn close(&self) -> ConnectionResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that hands out [`MockConnection`]s.
///
/// Sessions are created on first connect and kept so tests can inspect them.
#[derive(Debug, Default)]
pub struct MockConnector {
    sessions: RwLock<HashMap<String, Arc<MockConnection>>>,
    unreachable: RwLock<HashSet<String>>,
    attempts: RwLock<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connecting to `host` will fail
    pub fn fail_host(&self, host: &str) {
        self.unreachable.write().insert(host.to_string());
    }

    /// Pre-create the session for `host` so results can be scripted before the run
    pub fn prepare(&self, host: &Host) -> Arc<MockConnection> {
        self.sessions
            .write()
            .entry(host.name.clone())
            .or_insert_with(|| Arc::new(MockConnection::for_host(host)))
            .clone()
    }

    pub fn session(&self, host: &str) -> Option<Arc<MockConnection>> {
        self.sessions.read().get(host).cloned()
    }

    /// Host names in the order connection was attempted
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.read().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, host: &Host) -> ConnectionResult<Arc<dyn Connection>> {
        self.attempts.write().push(host.name.clone());
        if self.unreachable.read().contains(&host.name) {
            return Err(ConnectionError::ConnectionFailed {
                host: host.identity(),
                message: "Connection refused".to_string(),
            });
        }
        let session: Arc<dyn Connection> = self.prepare(host);
        Ok(session)
    }
}

/// Connection manager wired to a shared mock connector
pub fn mock_manager() -> (ConnectionManager, Arc<MockConnector>) {
    let connector = Arc::new(MockConnector::new());
    let manager = ConnectionManager::new(connector.clone());
    (manager, connector)
}

/// Captures engine events as compact strings
#[derive(Debug, Default)]
pub struct RecordingCallback {
    events: RwLock<Vec<String>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.read().clone()
    }

    /// Events starting with `prefix`
    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn push(&self, event: String) {
        self.events.write().push(event);
    }
}

#[async_trait]
impl ExecutionCallback for RecordingCallback {
    async fn on_run_start(&self, tasks: usize, hosts: usize) {
        self.push(format!("run_start tasks={} hosts={}", tasks, hosts));
    }

    async fn on_phase(&self, phase: RunPhase) {
        self.push(format!("phase {}", phase));
    }

    async fn on_host_unreachable(&self, host: &str, _error: &ConnectionError) {
        self.push(format!("unreachable {}", host));
    }

    async fn on_task_start(&self, task: &str, host: &str) {
        self.push(format!("start {} @ {}", task, host));
    }

    async fn on_task_skipped(&self, task: &str, host: &str, reason: &SkipReason) {
        self.push(format!("skipped {} @ {}: {}", task, host, reason));
    }

    async fn on_task_ok(&self, task: &str, host: &str) {
        self.push(format!("ok {} @ {}", task, host));
    }

    async fn on_task_failed(&self, task: &str, host: &str, error: &Error) {
        self.push(format!("failed {} @ {}: {}", task, host, error));
    }

    async fn on_run_end(&self, report: &RunReport) {
        self.push(format!("run_end outcomes={}", report.outcomes.len()));
    }
}

/// Parse an inventory document with `/keys` as key directory
pub fn inventory(yaml: &str) -> Inventory {
    Inventory::from_yaml(yaml, Path::new("hosts.yml"), Path::new("/keys"))
        .expect("inventory fixture should parse")
}

pub fn playbook(yaml: &str) -> Playbook {
    Playbook::from_yaml(yaml, Path::new("site.yml")).expect("playbook fixture should parse")
}

/// Three hosts: web1, web2 (key auth) and db1 (password auth)
pub fn three_host_inventory() -> Inventory {
    inventory(
        r#"
all:
  hosts:
    web1:
      address: 10.0.0.5
      user: ops
      key_file: id.pem
    web2:
      address: 10.0.0.6
      user: ops
      key_file: id.pem
    db1:
      address: 10.0.0.9
      user: admin
      port: 2222
      password: secret
"#,
    )
}
