//! Execution engine for DeployMate
//!
//! A run moves through `Idle → Connecting → Dispatching → Draining → Done`:
//!
//! - **Connecting**: open a session to every inventory host; unreachable hosts
//!   are reported and left out
//! - **Dispatching**: for each task in playbook order, for each target host in
//!   selection order, apply the task on that host's session
//! - **Draining**: close every session
//!
//! Failures are isolated to a single (task, host) pair. Nothing that happens
//! during dispatch stops the run; every outcome is recorded in the
//! [`RunReport`].

pub mod report;

pub use report::{HostStats, RunReport, SkipReason, TaskOutcome, TaskStatus};

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::callback::{ExecutionCallback, NullCallback};
use crate::connection::ConnectionManager;
use crate::error::Error;
use crate::inventory::Inventory;
use crate::modules::HandlerRegistry;
use crate::playbook::{Playbook, Task};

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Connecting,
    Dispatching,
    Draining,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Connecting => "connecting",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Draining => "draining",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Applies a playbook to an inventory
pub struct ExecutionEngine {
    registry: HandlerRegistry,
    callback: Arc<dyn ExecutionCallback>,
    phase: Mutex<RunPhase>,
}

impl ExecutionEngine {
    /// Create an engine with a silent callback
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            callback: Arc::new(NullCallback),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Route run events to `callback`
    #[must_use]
    pub fn with_callback(mut self, callback: Arc<dyn ExecutionCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    async fn enter(&self, phase: RunPhase) {
        *self.phase.lock() = phase;
        self.callback.on_phase(phase).await;
    }

    /// Run the whole playbook.
    ///
    /// Sessions are opened through `connections` and are all closed before
    /// this returns, whatever happened in between.
    #[instrument(skip_all, fields(tasks = playbook.task_count(), hosts = inventory.len()))]
    pub async fn run(
        &self,
        playbook: &Playbook,
        inventory: &Inventory,
        connections: &mut ConnectionManager,
    ) -> RunReport {
        let mut report = RunReport::default();
        self.callback
            .on_run_start(playbook.task_count(), inventory.len())
            .await;

        self.enter(RunPhase::Connecting).await;
        for (host, error) in connections.connect_all(inventory).await {
            self.callback.on_host_unreachable(&host, &error).await;
            report.unreachable.push(host);
        }

        self.enter(RunPhase::Dispatching).await;
        for task in &playbook.tasks {
            for host in task.target_hosts(inventory) {
                let status = self.dispatch(task, &host, connections).await;
                report.record(&task.name, &host, status);
            }
        }

        self.enter(RunPhase::Draining).await;
        connections.close_all().await;

        self.enter(RunPhase::Done).await;
        self.callback.on_run_end(&report).await;
        report
    }

    /// Apply one task to one host; never fails, the outcome says what happened
    async fn dispatch(
        &self,
        task: &Task,
        host: &str,
        connections: &ConnectionManager,
    ) -> TaskStatus {
        let Some(session) = connections.get(host) else {
            let reason = SkipReason::NoSession;
            self.callback.on_task_skipped(&task.name, host, &reason).await;
            return TaskStatus::Skipped(reason);
        };

        let handler = match self.registry.create_for_tag(&task.resource_type) {
            Ok(handler) => handler,
            Err(Error::UnknownResourceType(tag)) => {
                let reason = SkipReason::UnknownResourceType(tag);
                self.callback.on_task_skipped(&task.name, host, &reason).await;
                return TaskStatus::Skipped(reason);
            }
            Err(e) => {
                self.callback.on_task_failed(&task.name, host, &e).await;
                return TaskStatus::Failed(e.to_string());
            }
        };

        let resource = match &task.resource {
            Ok(resource) => resource,
            Err(e) => {
                self.callback.on_task_failed(&task.name, host, e).await;
                return TaskStatus::Failed(e.to_string());
            }
        };

        self.callback.on_task_start(&task.name, host).await;
        debug!(task = %task.name, host = %host, resource = %handler.kind(), "Dispatching");

        match handler.apply(resource, session.as_ref()).await {
            Ok(()) => {
                self.callback.on_task_ok(&task.name, host).await;
                TaskStatus::Ok
            }
            Err(e) => {
                let error = Error::from(e);
                self.callback.on_task_failed(&task.name, host, &error).await;
                TaskStatus::Failed(error.to_string())
            }
        }
    }
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("registry", &self.registry)
            .field("phase", &self.phase())
            .finish()
    }
}
