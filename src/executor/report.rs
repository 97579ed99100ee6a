//! Per-run outcome bookkeeping.

use indexmap::IndexMap;
use std::fmt;

/// Why a (task, host) pair was not applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The host has no live session (unreachable, or not in the inventory)
    NoSession,
    /// The task names a resource type no handler exists for
    UnknownResourceType(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoSession => f.write_str("no live session"),
            SkipReason::UnknownResourceType(tag) => write!(f, "Unknown resource type: {}", tag),
        }
    }
}

/// Outcome of one (task, host) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Ok,
    Failed(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task: String,
    pub host: String,
    pub status: TaskStatus,
}

/// Per-host counters for the recap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub ok: u32,
    pub failed: u32,
    pub skipped: u32,
    pub unreachable: bool,
}

/// Everything that happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per dispatched (task, host) pair, in dispatch order
    pub outcomes: Vec<TaskOutcome>,
    /// Hosts that could not be connected
    pub unreachable: Vec<String>,
}

impl RunReport {
    pub fn record(&mut self, task: &str, host: &str, status: TaskStatus) {
        self.outcomes.push(TaskOutcome {
            task: task.to_string(),
            host: host.to_string(),
            status,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Outcomes for a single host, in dispatch order
    pub fn for_host<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a TaskOutcome> + 'a {
        self.outcomes.iter().filter(move |o| o.host == host)
    }

    /// Counters per host; unreachable hosts first, then in order of first dispatch
    pub fn host_stats(&self) -> IndexMap<String, HostStats> {
        let mut stats: IndexMap<String, HostStats> = IndexMap::new();
        for host in &self.unreachable {
            stats.entry(host.clone()).or_default().unreachable = true;
        }
        for outcome in &self.outcomes {
            let entry = stats.entry(outcome.host.clone()).or_default();
            match outcome.status {
                TaskStatus::Ok => entry.ok += 1,
                TaskStatus::Failed(_) => entry.failed += 1,
                TaskStatus::Skipped(_) => entry.skipped += 1,
            }
        }
        stats
    }
}
