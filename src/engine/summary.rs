//! Run summary
//!
//! Terminations are recorded as they happen, so an interrupted run still
//! has everything that completed before the interrupt.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::tasks::{Failure, TaskId, TaskSnapshot, TaskState};

use super::status::StatusReport;

/// One task reaching a terminal state
///
/// A task inside a repeat terminates once per iteration and gets one record
/// each time.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    /// Names from the root down to this task
    pub path: String,
    pub kind: &'static str,
    pub state: TaskState,
    pub output: Option<String>,
    pub failure: Option<Failure>,
    pub finished_at: DateTime<Local>,
}

impl TaskRecord {
    pub fn is_leaf_failure(&self) -> bool {
        self.failure.as_ref().is_some_and(Failure::is_leaf_failure)
    }
}

/// Collects termination records while the run is in progress
#[derive(Debug, Default)]
pub struct SummaryCollector {
    records: Mutex<Vec<TaskRecord>>,
}

impl SummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: TaskRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Freeze what has been collected, together with the final tree state
    pub fn summarize(
        &self,
        scenario: &str,
        snapshot: Option<&TaskSnapshot>,
        aborted: bool,
        elapsed: Duration,
    ) -> RunSummary {
        let status = snapshot
            .map(StatusReport::from_snapshot)
            .unwrap_or_default();
        RunSummary {
            scenario: scenario.to_string(),
            root_state: snapshot.map(|s| s.state),
            status,
            records: self.records(),
            aborted,
            elapsed,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scenario: String,
    /// `None` when the run stopped before the tree was built
    pub root_state: Option<TaskState>,
    /// Per-state counts at the end of the run
    pub status: StatusReport,
    /// Every termination, in the order it happened
    pub records: Vec<TaskRecord>,
    /// Interrupted by the operator
    pub aborted: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn task_count(&self) -> usize {
        self.status.task_count
    }

    /// Errored terminations in the order they happened
    pub fn errors(&self) -> Vec<&TaskRecord> {
        self.records
            .iter()
            .filter(|r| r.state == TaskState::Errored)
            .collect()
    }

    /// Failures raised by leaf actions, as reported to the operator
    pub fn assertion_errors(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_leaf_failure())
            .filter_map(|r| {
                r.failure
                    .as_ref()
                    .map(|failure| format!("{}: {}", r.path, failure))
            })
            .collect()
    }

    /// Latest termination record of a task
    pub fn record(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.iter().rev().find(|r| r.id == id)
    }

    pub fn is_success(&self) -> bool {
        !self.aborted && self.root_state == Some(TaskState::Finished) && self.errors().is_empty()
    }
}
