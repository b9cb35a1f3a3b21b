//! Scenario Player - scripted test scenarios for a blockchain payment network
//!
//! A scenario is a tree of tasks: leaves submit transactions or check chain
//! state, composites run their children in sequence, in parallel, repeatedly
//! or conditionally. The engine runs the tree, waits for every submitted
//! transaction to be mined and keeps a live, snapshot-based view of progress.

pub mod chain;
pub mod cli;
pub mod commands;
pub mod common;
pub mod engine;
pub mod scenario;
pub mod tasks;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use engine::{RunSettings, RunSummary, ScenarioRunner};
