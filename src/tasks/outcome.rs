//! Recorded task failures

use thiserror::Error;

use crate::chain::TxId;
use crate::common::Error;

use super::TaskId;

/// Outcome a task reports when it leaves `Running`
///
/// The success value is a short human readable result.
pub type Outcome = std::result::Result<String, Failure>;

/// Why a task ended up `Errored`
///
/// Failures are data recorded on the task and in the run summary; they are
/// never raised past the task that produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The task's own action failed
    #[error("{0}")]
    Action(String),

    /// Submitted transactions were not mined in time
    #[error("Timeout waiting for transactions: {}", .0.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", "))]
    ConfirmationTimeout(Vec<TxId>),

    /// A serial child failed, remaining children were not started
    #[error("Child task '{name}' failed")]
    ChildFailed { child: TaskId, name: String },

    /// Some children of a parallel group failed
    #[error("{failed} of {started} started child tasks failed")]
    ChildrenFailed { failed: usize, started: usize },

    /// A repeat iteration failed, later iterations were not started
    #[error("Iteration {index} failed: {reason}")]
    Iteration { index: u32, reason: String },
}

impl Failure {
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }

    /// Whether this failure originated in a leaf rather than being
    /// propagated from children
    pub fn is_leaf_failure(&self) -> bool {
        matches!(self, Self::Action(_) | Self::ConfirmationTimeout(_))
    }
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        match e {
            Error::ConfirmationTimeout(ids) => Self::ConfirmationTimeout(ids),
            other => Self::Action(other.to_string()),
        }
    }
}
