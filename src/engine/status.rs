//! Live status derived from tree snapshots
//!
//! Everything here works on [`TaskSnapshot`]s, so it can be computed at any
//! time without holding up the scheduler.

use std::fmt::{self, Write};

use colored::Colorize;

use crate::tasks::{TaskSnapshot, TaskState};

/// Task counts at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// All nodes, composites included
    pub task_count: usize,
    /// Nodes running, composites still dispatching included
    pub running_task_count: usize,
    pub finished: usize,
    pub errored: usize,
    pub pending: usize,
}

impl StatusReport {
    pub fn from_snapshot(snapshot: &TaskSnapshot) -> Self {
        snapshot.iter().fold(Self::default(), |mut report, node| {
            report.task_count += 1;
            match node.state {
                TaskState::Pending => report.pending += 1,
                TaskState::Running => report.running_task_count += 1,
                TaskState::Finished => report.finished += 1,
                TaskState::Errored => report.errored += 1,
            }
            report
        })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tasks: {} - Running: {} - Errored: {}",
            self.task_count, self.running_task_count, self.errored
        )
    }
}

/// How [`render_tree`] formats its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// No escape codes, no timings; stable across runs
    Plain,
    /// Terminal colors by state, with elapsed times
    Colored,
}

/// Render a snapshot as an indented tree, one line per task
///
/// Lines follow declaration order with two spaces of indentation per level:
///
/// ```text
/// serial: smoke [RUNNING]
///   mint: Mint 1000 [FINISHED]
///   repeat: repeat [RUNNING] (iteration 2)
/// ```
pub fn render_tree(snapshot: &TaskSnapshot, style: RenderStyle) -> String {
    let mut out = String::new();
    for (depth, node) in snapshot.iter_with_depth() {
        let indent = "  ".repeat(depth);
        let mut line = format!("{}: {} [{}]", node.kind, node.name, node.state);
        if let Some(index) = node.iteration {
            let _ = write!(line, " (iteration {})", index);
        }
        if let Some(failure) = &node.failure {
            let _ = write!(line, " - {}", failure);
        }

        match style {
            RenderStyle::Plain => {
                let _ = writeln!(out, "{}{}", indent, line);
            }
            RenderStyle::Colored => {
                let line = match node.state {
                    TaskState::Pending => line.as_str().dimmed(),
                    TaskState::Running => line.as_str().yellow(),
                    TaskState::Finished => line.as_str().green(),
                    TaskState::Errored => line.as_str().red(),
                };
                match node.elapsed.filter(|_| node.state.is_terminal()) {
                    Some(elapsed) => {
                        let took = format!("{:.1}s", elapsed.as_secs_f64());
                        let _ = writeln!(out, "{}{} {}", indent, line, took.dimmed());
                    }
                    None => {
                        let _ = writeln!(out, "{}{}", indent, line);
                    }
                }
            }
        }
    }
    out
}
