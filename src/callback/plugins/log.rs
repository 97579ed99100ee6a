//! Log callback plugin.
//!
//! Turns run events into `tracing` records with structured `task` and `host`
//! fields. Verbosity is whatever the installed subscriber lets through.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::callback::ExecutionCallback;
use crate::connection::ConnectionError;
use crate::error::Error;
use crate::executor::{RunPhase, RunReport, SkipReason};

/// Callback that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCallback;

impl LogCallback {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionCallback for LogCallback {
    async fn on_run_start(&self, tasks: usize, hosts: usize) {
        info!(tasks, hosts, "Starting playbook execution");
    }

    async fn on_phase(&self, phase: RunPhase) {
        debug!(phase = %phase, "Run phase");
    }

    async fn on_host_unreachable(&self, host: &str, error: &ConnectionError) {
        error!(host = %host, error = %error, "Failed to establish SSH connection");
    }

    async fn on_task_start(&self, task: &str, host: &str) {
        debug!(task = %task, host = %host, "Starting task");
    }

    async fn on_task_skipped(&self, task: &str, host: &str, reason: &SkipReason) {
        match reason {
            SkipReason::NoSession => {
                warn!(task = %task, host = %host, "Skipping task, host has no live session")
            }
            SkipReason::UnknownResourceType(_) => {
                error!(task = %task, host = %host, error = %reason, "Skipping task")
            }
        }
    }

    async fn on_task_ok(&self, task: &str, host: &str) {
        info!(task = %task, host = %host, "Task completed");
    }

    async fn on_task_failed(&self, task: &str, host: &str, error: &Error) {
        error!(
            task = %task,
            host = %host,
            error = %error,
            "Error executing task '{}' on host '{}'",
            task,
            host
        );
    }

    async fn on_run_end(&self, report: &RunReport) {
        let failed = report.failures().count();
        if failed == 0 {
            info!(results = report.outcomes.len(), "Playbook execution completed");
        } else {
            warn!(
                results = report.outcomes.len(),
                failed,
                "Playbook execution completed with failures"
            );
        }
    }
}
