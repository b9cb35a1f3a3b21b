//! Work performed by leaf tasks

use std::fmt;

use async_trait::async_trait;

use crate::engine::ActionContext;

use super::Failure;

/// The concrete work of a leaf task
///
/// Transactions must be submitted through [`ActionContext::submit`] so the
/// scheduler can wait for their confirmation before the task finishes.
#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    /// Kind label, e.g. `transfer`
    fn kind(&self) -> &'static str;

    /// Name used when the scenario gives none
    fn describe(&self) -> String;

    /// Run the action, returning a short description of what it did
    async fn execute(&self, ctx: &ActionContext) -> Result<String, Failure>;

    /// Called once every transaction from `execute` is mined; may refine
    /// the output with what the chain now reports
    async fn confirmed(&self, _ctx: &ActionContext, output: String) -> Result<String, Failure> {
        Ok(output)
    }
}

/// A predicate over chain state
#[async_trait]
pub trait Condition: Send + Sync + fmt::Debug {
    fn describe(&self) -> String;

    async fn holds(&self, ctx: &ActionContext) -> Result<bool, Failure>;
}
