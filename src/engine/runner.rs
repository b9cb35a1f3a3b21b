//! Scenario runner
//!
//! Ties the pieces of a run together: the token, the task tree, the
//! scheduler and the summary. The runner is shared with the display, which
//! polls [`ScenarioRunner::status`] while [`ScenarioRunner::run`] is in
//! progress.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::AbortHandle;

use crate::chain::{
    Account, Address, ConfirmationWaiter, ContractResolver, NonceManager, SharedChain,
    TokenConfig,
};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::scenario::{Scenario, ScenarioSettings};
use crate::tasks::{TaskSnapshot, TaskSpec, TaskTree};

use super::events::{EventSink, TracingSink};
use super::scheduler::Scheduler;
use super::status::StatusReport;
use super::summary::{RunSummary, SummaryCollector};

/// Engine settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub status_log_interval: Duration,
    /// Cap for parallel groups that set none
    pub max_parallel: Option<usize>,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            confirmation_timeout: config.timeouts.confirmation(),
            poll_interval: config.timeouts.poll_interval(),
            status_log_interval: config.timeouts.status_log_interval(),
            max_parallel: config.scheduler.max_parallel,
        }
    }

    /// Apply a scenario's own settings on top
    pub fn with_overrides(mut self, overrides: &ScenarioSettings) -> Self {
        if let Some(secs) = overrides.confirmation_timeout_secs {
            self.confirmation_timeout = Duration::from_secs(secs);
        }
        if overrides.max_parallel.is_some() {
            self.max_parallel = overrides.max_parallel;
        }
        self
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where the task tree comes from
enum Plan {
    Scenario(Scenario),
    Spec(TaskSpec),
}

/// Runs one scenario against a chain
pub struct ScenarioRunner {
    name: String,
    settings: RunSettings,
    chain: SharedChain,
    nonces: Arc<NonceManager>,
    token_config: TokenConfig,
    plan: Plan,
    events: Arc<dyn EventSink>,
    tree: OnceLock<Arc<TaskTree>>,
    token: OnceLock<Address>,
    summary: Arc<SummaryCollector>,
    started: OnceLock<Instant>,
    abort: Mutex<Option<AbortHandle>>,
}

impl ScenarioRunner {
    pub fn new(
        settings: RunSettings,
        chain: SharedChain,
        account: Account,
        scenario: Scenario,
    ) -> Self {
        let settings = settings.with_overrides(&scenario.settings);
        let token = scenario.token.clone();
        Self::with_plan(
            scenario.name.clone(),
            settings,
            chain,
            account,
            Plan::Scenario(scenario),
        )
        .with_token(token)
    }

    /// Run a task spec built in code rather than loaded from a file
    pub fn from_spec(
        name: impl Into<String>,
        settings: RunSettings,
        chain: SharedChain,
        account: Account,
        spec: TaskSpec,
    ) -> Self {
        Self::with_plan(name.into(), settings, chain, account, Plan::Spec(spec))
    }

    fn with_plan(
        name: String,
        settings: RunSettings,
        chain: SharedChain,
        account: Account,
        plan: Plan,
    ) -> Self {
        Self {
            name,
            settings,
            chain,
            nonces: Arc::new(NonceManager::new(account)),
            token_config: TokenConfig::default(),
            plan,
            events: Arc::new(TracingSink),
            tree: OnceLock::new(),
            token: OnceLock::new(),
            summary: Arc::new(SummaryCollector::new()),
            started: OnceLock::new(),
            abort: Mutex::new(None),
        }
    }

    pub fn with_token(mut self, token: TokenConfig) -> Self {
        self.token_config = token;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// The live tree, once built
    pub fn tree(&self) -> Option<&Arc<TaskTree>> {
        self.tree.get()
    }

    /// The token the run acts on, once resolved
    pub fn token(&self) -> Option<&Address> {
        self.token.get()
    }

    pub fn snapshot(&self) -> Option<TaskSnapshot> {
        self.tree().map(|tree| tree.snapshot())
    }

    pub fn status(&self) -> StatusReport {
        self.snapshot()
            .map(|s| StatusReport::from_snapshot(&s))
            .unwrap_or_default()
    }

    pub fn task_count(&self) -> usize {
        self.tree().map(|tree| tree.len()).unwrap_or(0)
    }

    pub fn running_task_count(&self) -> usize {
        self.status().running_task_count
    }

    /// Build the tree, resolve the token and run every task
    ///
    /// The tree is validated before anything is sent to the chain, so a
    /// malformed scenario costs no transactions. A runner runs once.
    pub async fn run(&self) -> Result<RunSummary> {
        if self.started.set(Instant::now()).is_err() {
            return Err(Error::Internal(format!(
                "Scenario '{}' has already been run",
                self.name
            )));
        }

        let spec = match &self.plan {
            Plan::Scenario(scenario) => scenario.to_spec()?,
            Plan::Spec(spec) => spec.clone(),
        };
        let tree = Arc::new(TaskTree::build(spec)?);
        let tree = self.tree.get_or_init(|| tree).clone();
        tracing::info!(scenario = %self.name, tasks = tree.len(), "Task tree built");

        let waiter = ConfirmationWaiter::with_intervals(
            self.chain.clone(),
            self.settings.poll_interval,
            self.settings.status_log_interval,
        );
        let resolver = ContractResolver::new(
            self.chain.clone(),
            self.nonces.clone(),
            waiter.clone(),
            self.settings.confirmation_timeout,
        );
        let token = resolver.resolve_or_deploy(&self.token_config).await?;
        let token = self.token.get_or_init(|| token).clone();

        let scheduler = Scheduler::new(tree, self.chain.clone(), self.nonces.clone(), waiter)
            .with_token(token)
            .with_confirmation_timeout(self.settings.confirmation_timeout)
            .with_default_max_parallel(self.settings.max_parallel)
            .with_events(self.events.clone())
            .with_summary(self.summary.clone());

        let handle = tokio::spawn(async move { scheduler.run().await });
        *self.abort.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.abort_handle());

        let root_state = handle
            .await
            .map_err(|e| Error::Internal(format!("Scheduler task failed: {}", e)))??;
        tracing::info!(scenario = %self.name, state = %root_state, "Run complete");

        Ok(self.summarize(false))
    }

    /// Stop the scheduler where it is
    ///
    /// Transactions already submitted are left to the chain.
    pub fn abort(&self) {
        if let Some(handle) = self.abort.lock().unwrap_or_else(PoisonError::into_inner).take() {
            tracing::warn!(scenario = %self.name, "Aborting run");
            handle.abort();
        }
    }

    /// Summary of what has completed so far, for an aborted run
    pub fn partial_summary(&self) -> RunSummary {
        self.summarize(true)
    }

    fn summarize(&self, aborted: bool) -> RunSummary {
        let elapsed = self
            .started
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default();
        self.summary
            .summarize(&self.name, self.snapshot().as_ref(), aborted, elapsed)
    }
}
