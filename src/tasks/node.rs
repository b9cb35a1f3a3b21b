//! Task node state machine

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::common::{Error, Result};

use super::action::{Action, Condition};
use super::{Failure, Outcome};

/// Identifier of a task, unique within a run
///
/// Ids are handed out in declaration order (pre-order), so sorting by id
/// gives the order tasks appear in the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Finished,
    Errored,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Errored)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Errored => "ERRORED",
        })
    }
}

/// Bounds on a repeat node's iterations
///
/// Iteration stops at whichever bound is hit first. At least one bound must
/// be set for the node to be valid.
#[derive(Debug, Clone, Default)]
pub struct RepeatPolicy {
    pub count: Option<u32>,
    /// Checked before each iteration
    pub duration: Option<Duration>,
    /// Evaluated before each iteration; iteration stops once it is false
    pub condition: Option<Arc<dyn Condition>>,
}

impl RepeatPolicy {
    pub fn times(count: u32) -> Self {
        Self {
            count: Some(count),
            ..Default::default()
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.duration.is_some() || self.condition.is_some()
    }
}

/// What a node does when it runs
#[derive(Debug, Clone)]
pub enum TaskKind {
    Leaf(Arc<dyn Action>),
    /// Children one at a time, stopping at the first error
    Sequential,
    /// Children concurrently, optionally capped
    Parallel {
        max_concurrency: Option<usize>,
        /// Keep admitting children after one has errored
        continue_on_error: bool,
    },
    /// The single child subtree, re-run per the policy
    Repeat(RepeatPolicy),
    /// Children in order, only if the condition holds when started
    Conditional(Arc<dyn Condition>),
}

impl TaskKind {
    /// Short label used in renders and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Leaf(action) => action.kind(),
            Self::Sequential => "serial",
            Self::Parallel { .. } => "parallel",
            Self::Repeat(_) => "repeat",
            Self::Conditional(_) => "conditional",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}

/// Mutable part of a node, published as one unit
#[derive(Debug, Clone, Default)]
struct NodeStatus {
    state: TaskState,
    iteration: Option<u32>,
    output: Option<String>,
    failure: Option<Failure>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// A node of the task tree
///
/// The shape (kind, children) is fixed at build time; only the status
/// changes while the scenario runs. Parents own their children and children
/// refer back to their parent by id only.
#[derive(Debug)]
pub struct TaskNode {
    id: TaskId,
    parent: Option<TaskId>,
    name: String,
    kind: TaskKind,
    children: Vec<TaskNode>,
    status: RwLock<NodeStatus>,
}

impl TaskNode {
    pub(crate) fn new(
        id: TaskId,
        parent: Option<TaskId>,
        name: String,
        kind: TaskKind,
        children: Vec<TaskNode>,
    ) -> Self {
        Self {
            id,
            parent,
            name,
            kind,
            children,
            status: RwLock::new(NodeStatus::default()),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn children(&self) -> &[TaskNode] {
        &self.children
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeStatus> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeStatus> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TaskState {
        self.read().state
    }

    pub fn failure(&self) -> Option<Failure> {
        self.read().failure.clone()
    }

    pub fn output(&self) -> Option<String> {
        self.read().output.clone()
    }

    pub fn iteration(&self) -> Option<u32> {
        self.read().iteration
    }

    /// Move from `Pending` to `Running`
    ///
    /// Returns `false` if the node was already running. Starting a node that
    /// has already terminated is an `InvalidTransition`.
    pub fn start(&self) -> Result<bool> {
        let mut status = self.write();
        match status.state {
            TaskState::Pending => {
                status.state = TaskState::Running;
                status.started_at = Some(Instant::now());
                Ok(true)
            }
            TaskState::Running => Ok(false),
            state => Err(self.invalid("start", state)),
        }
    }

    /// Record the outcome and move to `Finished` or `Errored`
    ///
    /// Only a running node can report.
    pub fn report(&self, outcome: Outcome) -> Result<TaskState> {
        let mut status = self.write();
        if status.state != TaskState::Running {
            return Err(self.invalid("report", status.state));
        }
        status.finished_at = Some(Instant::now());
        status.state = match outcome {
            Ok(output) => {
                status.output = Some(output);
                TaskState::Finished
            }
            Err(failure) => {
                status.failure = Some(failure);
                TaskState::Errored
            }
        };
        Ok(status.state)
    }

    /// Set the iteration a running repeat node is on
    pub(crate) fn set_iteration(&self, index: u32) {
        self.write().iteration = Some(index);
    }

    /// Put this subtree back to `Pending` for another iteration
    ///
    /// Fails if any node in the subtree is still running.
    pub(crate) fn reset(&self) -> Result<()> {
        {
            let mut status = self.write();
            if status.state == TaskState::Running {
                return Err(self.invalid("reset", status.state));
            }
            *status = NodeStatus::default();
        }
        self.children.iter().try_for_each(TaskNode::reset)
    }

    fn invalid(&self, action: &str, state: TaskState) -> Error {
        Error::invalid_transition(
            &format!("{} '{}'", self.id, self.name),
            action,
            &state.to_string(),
        )
    }

    /// Point-in-time copy of this subtree
    ///
    /// Each node's status is copied under its own lock, so no node is ever
    /// seen half updated.
    pub fn snapshot(&self) -> TaskSnapshot {
        let status = self.read().clone();
        let elapsed = status.started_at.map(|started| {
            status
                .finished_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(started)
        });
        TaskSnapshot {
            id: self.id,
            parent: self.parent,
            name: self.name.clone(),
            kind: self.kind.label(),
            state: status.state,
            iteration: status.iteration,
            output: status.output,
            failure: status.failure,
            elapsed,
            children: self.children.iter().map(TaskNode::snapshot).collect(),
        }
    }
}

/// Immutable view of a node and its subtree
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub parent: Option<TaskId>,
    pub name: String,
    pub kind: &'static str,
    pub state: TaskState,
    pub iteration: Option<u32>,
    pub output: Option<String>,
    pub failure: Option<Failure>,
    pub elapsed: Option<Duration>,
    pub children: Vec<TaskSnapshot>,
}

impl TaskSnapshot {
    /// All nodes of the subtree in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &TaskSnapshot> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Nodes of the subtree with their depth below this node
    pub fn iter_with_depth(&self) -> impl Iterator<Item = (usize, &TaskSnapshot)> {
        let mut stack = vec![(0, self)];
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
            Some((depth, node))
        })
    }
}
