//! Tree execution
//!
//! The whole tree runs inside one future. Composite nodes drive their
//! children's futures directly (parallel children through
//! `FuturesUnordered`), so execution interleaves only where a leaf action,
//! the confirmation waiter or a sleep awaits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use crate::chain::{Address, ConfirmationWaiter, NonceManager, SharedChain};
use crate::common::{Error, Result};
use crate::tasks::{
    Action, Condition, Failure, Outcome, RepeatPolicy, TaskKind, TaskNode, TaskState, TaskTree,
};

use super::context::ActionContext;
use super::events::{EventSink, TaskEvent, TracingSink};
use super::summary::{SummaryCollector, TaskRecord};

/// Runs a task tree to completion
///
/// Failures of individual tasks are recorded on the tasks and in the
/// summary; only `InvalidTransition` (and other fatal errors) escape
/// [`Scheduler::run`].
pub struct Scheduler {
    tree: Arc<TaskTree>,
    chain: SharedChain,
    nonces: Arc<NonceManager>,
    waiter: ConfirmationWaiter,
    token: Option<Address>,
    confirmation_timeout: Duration,
    /// Cap for parallel nodes that set none
    default_max_parallel: Option<usize>,
    events: Arc<dyn EventSink>,
    summary: Arc<SummaryCollector>,
}

impl Scheduler {
    pub fn new(
        tree: Arc<TaskTree>,
        chain: SharedChain,
        nonces: Arc<NonceManager>,
        waiter: ConfirmationWaiter,
    ) -> Self {
        Self {
            tree,
            chain,
            nonces,
            waiter,
            token: None,
            confirmation_timeout: Duration::from_secs(180),
            default_max_parallel: None,
            events: Arc::new(TracingSink),
            summary: Arc::new(SummaryCollector::new()),
        }
    }

    pub fn with_token(mut self, token: Address) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_default_max_parallel(mut self, cap: Option<usize>) -> Self {
        self.default_max_parallel = cap;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_summary(mut self, summary: Arc<SummaryCollector>) -> Self {
        self.summary = summary;
        self
    }

    /// Run the tree from the root and return the root's final state
    pub async fn run(&self) -> Result<TaskState> {
        self.run_node(self.tree.root()).await
    }

    fn run_node<'s>(&'s self, node: &'s TaskNode) -> BoxFuture<'s, Result<TaskState>> {
        async move {
            if node.start()? {
                self.events.emit(TaskEvent::Started {
                    id: node.id(),
                    name: node.name().to_string(),
                    kind: node.kind().label(),
                });
            }

            let outcome = match node.kind() {
                TaskKind::Leaf(action) => self.run_leaf(node, action.as_ref()).await?,
                TaskKind::Sequential => self.run_sequential(node.children()).await?,
                TaskKind::Parallel {
                    max_concurrency,
                    continue_on_error,
                } => {
                    let cap = max_concurrency.or(self.default_max_parallel);
                    self.run_parallel(node.children(), cap, *continue_on_error)
                        .await?
                }
                TaskKind::Repeat(policy) => self.run_repeat(node, policy).await?,
                TaskKind::Conditional(condition) => {
                    self.run_conditional(node, condition.as_ref()).await?
                }
            };

            let state = node.report(outcome)?;
            self.finished(node, state);
            Ok(state)
        }
        .boxed()
    }

    fn context(&self, node: &TaskNode) -> ActionContext {
        ActionContext::new(
            node.id(),
            self.chain.clone(),
            self.nonces.clone(),
            self.token.clone(),
        )
    }

    async fn run_leaf(&self, node: &TaskNode, action: &dyn Action) -> Result<Outcome> {
        let ctx = self.context(node);
        let output = match action.execute(&ctx).await {
            Ok(output) => output,
            Err(failure) => return Ok(Err(failure)),
        };

        let pending = ctx.pending();
        if !pending.is_empty() {
            match self.waiter.wait(&pending, self.confirmation_timeout).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => return Ok(Err(Failure::from(e))),
            }
        }
        Ok(action.confirmed(&ctx, output).await)
    }

    /// One child at a time, stopping at the first error
    async fn run_sequential(&self, children: &[TaskNode]) -> Result<Outcome> {
        for child in children {
            if self.run_node(child).await? == TaskState::Errored {
                return Ok(Err(Failure::ChildFailed {
                    child: child.id(),
                    name: child.name().to_string(),
                }));
            }
        }
        Ok(Ok(format!("{} tasks finished", children.len())))
    }

    /// Children concurrently, admitted in declaration order up to `cap`
    ///
    /// After an error no new children are admitted unless
    /// `continue_on_error` is set; children already started always run to
    /// completion.
    async fn run_parallel(
        &self,
        children: &[TaskNode],
        cap: Option<usize>,
        continue_on_error: bool,
    ) -> Result<Outcome> {
        let cap = cap.unwrap_or(children.len()).max(1);
        let mut queue = children.iter();
        let mut running = FuturesUnordered::new();
        let mut started = 0;
        let mut failed = 0;

        loop {
            while running.len() < cap && (failed == 0 || continue_on_error) {
                match queue.next() {
                    Some(child) => {
                        running.push(self.run_node(child));
                        started += 1;
                    }
                    None => break,
                }
            }
            match running.next().await {
                Some(state) => {
                    if state? == TaskState::Errored {
                        failed += 1;
                    }
                }
                None => break,
            }
        }

        if failed > 0 {
            if started < children.len() {
                tracing::debug!(
                    skipped = children.len() - started,
                    "Parallel group stopped admitting tasks after an error"
                );
            }
            return Ok(Err(Failure::ChildrenFailed { failed, started }));
        }
        Ok(Ok(format!("{} tasks finished", started)))
    }

    async fn run_repeat(&self, node: &TaskNode, policy: &RepeatPolicy) -> Result<Outcome> {
        let child = node
            .children()
            .first()
            .ok_or_else(|| Error::Internal(format!("Repeat task {} has no child", node.id())))?;
        let started = Instant::now();
        let mut index = 0u32;

        loop {
            if policy.count.is_some_and(|count| index >= count) {
                break;
            }
            if policy.duration.is_some_and(|d| started.elapsed() >= d) {
                break;
            }
            if let Some(condition) = &policy.condition {
                match condition.holds(&self.context(node)).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(failure) => return Ok(Err(failure)),
                }
            }

            index += 1;
            if index > 1 {
                child.reset()?;
            }
            node.set_iteration(index);
            self.events.emit(TaskEvent::Iteration {
                id: node.id(),
                name: node.name().to_string(),
                index,
            });

            if self.run_node(child).await? == TaskState::Errored {
                let reason = child
                    .failure()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Ok(Err(Failure::Iteration { index, reason }));
            }
        }
        Ok(Ok(format!("{} iterations", index)))
    }

    /// Children in order if the condition holds, otherwise skipped
    async fn run_conditional(&self, node: &TaskNode, condition: &dyn Condition) -> Result<Outcome> {
        match condition.holds(&self.context(node)).await {
            Ok(true) => self.run_sequential(node.children()).await,
            Ok(false) => {
                tracing::debug!(task = %node.id(), condition = %condition.describe(), "Condition false, skipping");
                Ok(Ok("skipped".to_string()))
            }
            Err(failure) => Ok(Err(failure)),
        }
    }

    fn finished(&self, node: &TaskNode, state: TaskState) {
        let output = node.output();
        let failure = node.failure();
        self.summary.record(TaskRecord {
            id: node.id(),
            name: node.name().to_string(),
            path: self.tree.breadcrumb(node.id()),
            kind: node.kind().label(),
            state,
            output: output.clone(),
            failure: failure.clone(),
            finished_at: Local::now(),
        });
        self.events.emit(TaskEvent::Finished {
            id: node.id(),
            name: node.name().to_string(),
            state,
            output,
            failure,
        });
    }
}
