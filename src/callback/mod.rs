//! Run event callbacks
//!
//! The engine reports what it does through an [`ExecutionCallback`] it is
//! given at construction. Nothing is logged through global state from the
//! engine itself, so tests can capture a run's events exactly.
//!
//! # Available Plugins
//!
//! - [`LogCallback`] - forwards events to `tracing`
//! - [`RecapCallback`] - prints a colored per-host recap when the run ends
//! - [`NullCallback`] - discards everything
//!
//! Several callbacks can be combined with [`CallbackSet`].
//!
//! ```rust,ignore
//! use deploymate::callback::{CallbackSet, LogCallback, RecapCallback};
//!
//! let callbacks = CallbackSet::new()
//!     .with(LogCallback::new())
//!     .with(RecapCallback::new());
//! let engine = ExecutionEngine::new(registry).with_callback(Arc::new(callbacks));
//! ```

pub mod plugins;

pub use plugins::{LogCallback, NullCallback, RecapCallback};

use async_trait::async_trait;
use std::sync::Arc;

use crate::connection::ConnectionError;
use crate::error::Error;
use crate::executor::{RunPhase, RunReport, SkipReason};

/// Receives execution events of one run.
///
/// Every method has a no-op default.
#[async_trait]
pub trait ExecutionCallback: Send + Sync {
    /// Called before connecting.
    async fn on_run_start(&self, tasks: usize, hosts: usize) {
        let _ = (tasks, hosts);
    }

    /// Called on every phase transition.
    async fn on_phase(&self, phase: RunPhase) {
        let _ = phase;
    }

    /// Called for each host whose connection failed.
    async fn on_host_unreachable(&self, host: &str, error: &ConnectionError) {
        let _ = (host, error);
    }

    /// Called right before a task is applied to a host.
    async fn on_task_start(&self, task: &str, host: &str) {
        let _ = (task, host);
    }

    /// Called when a (task, host) pair is not applied.
    async fn on_task_skipped(&self, task: &str, host: &str, reason: &SkipReason) {
        let _ = (task, host, reason);
    }

    /// Called when a task was applied without error.
    async fn on_task_ok(&self, task: &str, host: &str) {
        let _ = (task, host);
    }

    /// Called when applying a task to a host failed.
    async fn on_task_failed(&self, task: &str, host: &str, error: &Error) {
        let _ = (task, host, error);
    }

    /// Called once all sessions are closed.
    async fn on_run_end(&self, report: &RunReport) {
        let _ = report;
    }
}

/// Fans every event out to several callbacks, in insertion order
#[derive(Default, Clone)]
pub struct CallbackSet {
    callbacks: Vec<Arc<dyn ExecutionCallback>>,
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, callback: impl ExecutionCallback + 'static) -> Self {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn push(&mut self, callback: Arc<dyn ExecutionCallback>) {
        self.callbacks.push(callback);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[async_trait]
impl ExecutionCallback for CallbackSet {
    async fn on_run_start(&self, tasks: usize, hosts: usize) {
        for cb in &self.callbacks {
            cb.on_run_start(tasks, hosts).await;
        }
    }

    async fn on_phase(&self, phase: RunPhase) {
        for cb in &self.callbacks {
            cb.on_phase(phase).await;
        }
    }

    async fn on_host_unreachable(&self, host: &str, error: &ConnectionError) {
        for cb in &self.callbacks {
            cb.on_host_unreachable(host, error).await;
        }
    }

    async fn on_task_start(&self, task: &str, host: &str) {
        for cb in &self.callbacks {
            cb.on_task_start(task, host).await;
        }
    }

    async fn on_task_skipped(&self, task: &str, host: &str, reason: &SkipReason) {
        for cb in &self.callbacks {
            cb.on_task_skipped(task, host, reason).await;
        }
    }

    async fn on_task_ok(&self, task: &str, host: &str) {
        for cb in &self.callbacks {
            cb.on_task_ok(task, host).await;
        }
    }

    async fn on_task_failed(&self, task: &str, host: &str, error: &Error) {
        for cb in &self.callbacks {
            cb.on_task_failed(task, host, error).await;
        }
    }

    async fn on_run_end(&self, report: &RunReport) {
        for cb in &self.callbacks {
            cb.on_run_end(report).await;
        }
    }
}
