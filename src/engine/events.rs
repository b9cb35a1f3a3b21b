//! Structured task events
//!
//! The scheduler reports every start, iteration and termination to an
//! [`EventSink`]. Where the events end up (log, channel, terminal) is up to
//! whoever constructs the runner.

use tokio::sync::mpsc;

use crate::tasks::{Failure, TaskId, TaskState};

/// A state change of one task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Started {
        id: TaskId,
        name: String,
        kind: &'static str,
    },
    /// A repeat node began iteration `index` (1-based)
    Iteration {
        id: TaskId,
        name: String,
        index: u32,
    },
    Finished {
        id: TaskId,
        name: String,
        state: TaskState,
        output: Option<String>,
        failure: Option<Failure>,
    },
}

/// Receiver of task events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TaskEvent);
}

/// Writes events to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TaskEvent) {
        match event {
            TaskEvent::Started { id, name, kind } => {
                tracing::debug!(task = %id, kind, "Started {}", name);
            }
            TaskEvent::Iteration { id, name, index } => {
                tracing::debug!(task = %id, iteration = index, "Iteration of {}", name);
            }
            TaskEvent::Finished {
                id,
                name,
                failure: Some(failure),
                ..
            } => {
                tracing::warn!(task = %id, error = %failure, "Task {} errored", name);
            }
            TaskEvent::Finished {
                id, name, output, ..
            } => {
                tracing::info!(
                    task = %id,
                    output = output.as_deref().unwrap_or(""),
                    "Finished {}",
                    name
                );
            }
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TaskEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

/// Sends every event to each of several sinks
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: TaskEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
