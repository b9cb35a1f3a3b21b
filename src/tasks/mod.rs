//! Task tree model
//!
//! A scenario becomes a tree of [`TaskNode`]s. Leaves carry an [`Action`],
//! composites (serial, parallel, repeat, conditional) orchestrate their
//! children. Node state only moves forward:
//!
//! ```text
//! PENDING -> RUNNING -> FINISHED | ERRORED
//! ```
//!
//! except that a repeat node resets its subtree between iterations.

pub mod action;
pub mod builtin;
pub mod node;
pub mod outcome;
pub mod tree;

pub use action::{Action, Condition};
pub use node::{RepeatPolicy, TaskId, TaskKind, TaskNode, TaskSnapshot, TaskState};
pub use outcome::{Failure, Outcome};
pub use tree::{TaskSpec, TaskTree};
