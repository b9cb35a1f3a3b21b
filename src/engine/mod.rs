//! Scenario execution engine
//!
//! [`ScenarioRunner`] is the entry point. It builds the task tree, resolves
//! the token and hands the tree to the [`Scheduler`]; progress can be read
//! at any time through snapshots ([`StatusReport`], [`render_tree`]) and the
//! [`EventSink`] the runner was given.

pub mod context;
pub mod events;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod summary;

pub use context::ActionContext;
pub use events::{ChannelSink, EventSink, FanoutSink, TaskEvent, TracingSink};
pub use runner::{RunSettings, ScenarioRunner};
pub use scheduler::Scheduler;
pub use status::{render_tree, RenderStyle, StatusReport};
pub use summary::{RunSummary, SummaryCollector, TaskRecord};
