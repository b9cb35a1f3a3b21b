//! Scheduler behavior through the public runner API
//!
//! These tests build task trees in code with recording actions that record
//! when they start and end, run them against the in-memory chain and check
//! ordering, failure propagation and the run summary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scenario_player::chain::{Account, Address, MockChain, TokenConfig};
use scenario_player::engine::{
    ActionContext, ChannelSink, RunSettings, ScenarioRunner, TaskEvent,
};
use scenario_player::tasks::builtin::{DeployToken, Mint};
use scenario_player::tasks::{
    Action, Condition, Failure, RepeatPolicy, TaskSpec, TaskState, TaskTree,
};
use scenario_player::Error;

type Log = Arc<Mutex<Vec<String>>>;

/// Action that sleeps, logs its start and end, and optionally fails on a
/// given call
#[derive(Debug, Clone)]
struct Recorder {
    label: &'static str,
    delay: Duration,
    /// 1-based call on which to fail
    fail_on: Option<u32>,
    calls: Arc<AtomicU32>,
    log: Log,
}

impl Recorder {
    fn new(label: &'static str, delay_ms: u64, log: &Log) -> Self {
        Self {
            label,
            delay: Duration::from_millis(delay_ms),
            fail_on: None,
            calls: Arc::new(AtomicU32::new(0)),
            log: log.clone(),
        }
    }

    fn failing_on(mut self, call: u32) -> Self {
        self.fail_on = Some(call);
        self
    }

    fn spec(&self) -> TaskSpec {
        TaskSpec::leaf(self.clone()).named(self.label)
    }
}

#[async_trait]
impl Action for Recorder {
    fn kind(&self) -> &'static str {
        "record"
    }

    fn describe(&self) -> String {
        self.label.to_string()
    }

    async fn execute(&self, _ctx: &ActionContext) -> Result<String, Failure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().unwrap().push(format!("start {}", self.label));
        tokio::time::sleep(self.delay).await;
        self.log.lock().unwrap().push(format!("end {}", self.label));
        if self.fail_on == Some(call) {
            return Err(Failure::action(format!("{} failed", self.label)));
        }
        Ok(format!("{} done", self.label))
    }
}

#[derive(Debug)]
struct Always(bool);

#[async_trait]
impl Condition for Always {
    fn describe(&self) -> String {
        format!("always {}", self.0)
    }

    async fn holds(&self, _ctx: &ActionContext) -> Result<bool, Failure> {
        Ok(self.0)
    }
}

/// Holds for a fixed number of checks, then stops holding
#[derive(Debug)]
struct Countdown {
    remaining: AtomicU32,
    checks: Arc<AtomicU32>,
}

impl Countdown {
    fn new(holds_for: u32) -> Self {
        Self {
            remaining: AtomicU32::new(holds_for),
            checks: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Condition for Countdown {
    fn describe(&self) -> String {
        "countdown".to_string()
    }

    async fn holds(&self, _ctx: &ActionContext) -> Result<bool, Failure> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let holds = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(holds)
    }
}

/// Condition whose evaluation always fails
#[derive(Debug)]
struct Unreadable;

#[async_trait]
impl Condition for Unreadable {
    fn describe(&self) -> String {
        "unreadable".to_string()
    }

    async fn holds(&self, _ctx: &ActionContext) -> Result<bool, Failure> {
        Err(Failure::action("balance query failed"))
    }
}

fn settings() -> RunSettings {
    RunSettings {
        confirmation_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        status_log_interval: Duration::from_secs(10),
        max_parallel: None,
    }
}

fn account() -> Account {
    Account::new(Address::parse("0x00000000000000000000000000000000000000a0").unwrap())
}

fn runner(spec: TaskSpec) -> (Arc<ScenarioRunner>, Arc<MockChain>) {
    let chain = Arc::new(MockChain::new());
    let runner = ScenarioRunner::from_spec("test", settings(), chain.clone(), account(), spec);
    (Arc::new(runner), chain)
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_task_count_matches_tree_during_and_after_run() {
    let log = log();
    let spec = TaskSpec::sequential(vec![
        Recorder::new("a", 20, &log).spec(),
        TaskSpec::parallel(vec![
            Recorder::new("b", 20, &log).spec(),
            Recorder::new("c", 30, &log).spec(),
        ]),
    ]);
    let expected = TaskTree::build(spec.clone()).unwrap().len();
    assert_eq!(expected, 5);

    let (runner, _) = runner(spec);
    assert_eq!(runner.task_count(), 0);

    let handle = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });
    while !handle.is_finished() {
        if runner.tree().is_some() {
            assert_eq!(runner.status().task_count, expected);
            assert_eq!(runner.task_count(), expected);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.task_count(), expected);
    assert_eq!(summary.status.finished, expected);
    assert_eq!(runner.running_task_count(), 0);
    assert!(summary.is_success());
}

#[tokio::test]
async fn test_sequential_children_never_overlap() {
    let log = log();
    let spec = TaskSpec::sequential(vec![
        Recorder::new("a", 15, &log).spec(),
        Recorder::new("b", 15, &log).spec(),
        Recorder::new("c", 15, &log).spec(),
    ]);
    let (runner, _) = runner(spec);

    let handle = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });
    while !handle.is_finished() {
        if let Some(snapshot) = runner.snapshot() {
            let running = snapshot
                .children
                .iter()
                .filter(|c| c.state == TaskState::Running)
                .count();
            assert!(running <= 1, "{} serial children running at once", running);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    handle.await.unwrap().unwrap();

    assert_eq!(
        entries(&log),
        vec!["start a", "end a", "start b", "end b", "start c", "end c"]
    );
}

#[tokio::test]
async fn test_sequential_stops_at_first_error() {
    let log = log();
    let spec = TaskSpec::sequential(vec![
        Recorder::new("a", 5, &log).spec(),
        Recorder::new("b", 5, &log).failing_on(1).spec(),
        Recorder::new("c", 5, &log).spec(),
    ])
    .named("root");
    let (runner, _) = runner(spec);

    let summary = runner.run().await.unwrap();
    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.state, TaskState::Errored);
    assert!(matches!(
        snapshot.failure,
        Some(Failure::ChildFailed { ref name, .. }) if name == "b"
    ));
    assert_eq!(snapshot.children[2].state, TaskState::Pending);
    assert!(!entries(&log).contains(&"start c".to_string()));
    assert_eq!(summary.assertion_errors(), vec!["root > b: b failed".to_string()]);
}

#[tokio::test]
async fn test_parallel_error_keeps_running_sibling_result() {
    let log = log();
    let spec = TaskSpec::parallel(vec![
        Recorder::new("a", 60, &log).spec(),
        Recorder::new("b", 5, &log).failing_on(1).spec(),
    ]);
    let (runner, _) = runner(spec);

    let summary = runner.run().await.unwrap();

    // b failed while a was still running; a was not cancelled
    let order = entries(&log);
    let b_end = order.iter().position(|e| e == "end b").unwrap();
    let a_end = order.iter().position(|e| e == "end a").unwrap();
    assert!(b_end < a_end);

    assert_eq!(summary.root_state, Some(TaskState::Errored));
    let a = summary.records.iter().find(|r| r.name == "a").unwrap();
    assert_eq!(a.state, TaskState::Finished);
    assert_eq!(a.output.as_deref(), Some("a done"));

    let errored: Vec<_> = summary.errors().iter().map(|r| r.name.clone()).collect();
    assert_eq!(errored, vec!["b".to_string(), "parallel".to_string()]);
    assert_eq!(
        summary.errors()[1].failure,
        Some(Failure::ChildrenFailed {
            failed: 1,
            started: 2
        })
    );
}

#[tokio::test]
async fn test_capped_parallel_stops_admitting_after_error() {
    let log = log();
    let spec = TaskSpec::Parallel {
        name: None,
        children: vec![
            Recorder::new("a", 5, &log).failing_on(1).spec(),
            Recorder::new("b", 5, &log).spec(),
            Recorder::new("c", 5, &log).spec(),
        ],
        max_concurrency: Some(1),
        continue_on_error: false,
    };
    let (runner, _) = runner(spec);
    runner.run().await.unwrap();

    let snapshot = runner.snapshot().unwrap();
    assert_eq!(
        snapshot.failure,
        Some(Failure::ChildrenFailed {
            failed: 1,
            started: 1
        })
    );
    assert_eq!(snapshot.children[1].state, TaskState::Pending);
    assert_eq!(snapshot.children[2].state, TaskState::Pending);
    assert_eq!(entries(&log), vec!["start a", "end a"]);
}

#[tokio::test]
async fn test_capped_parallel_continue_on_error() {
    let log = log();
    let spec = TaskSpec::Parallel {
        name: None,
        children: vec![
            Recorder::new("a", 5, &log).failing_on(1).spec(),
            Recorder::new("b", 5, &log).spec(),
            Recorder::new("c", 5, &log).spec(),
        ],
        max_concurrency: Some(1),
        continue_on_error: true,
    };
    let (runner, _) = runner(spec);
    runner.run().await.unwrap();

    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.state, TaskState::Errored);
    assert_eq!(
        snapshot.failure,
        Some(Failure::ChildrenFailed {
            failed: 1,
            started: 3
        })
    );
    assert_eq!(snapshot.children[2].state, TaskState::Finished);
    // capped at one: strictly one after another
    assert_eq!(
        entries(&log),
        vec!["start a", "end a", "start b", "end b", "start c", "end c"]
    );
}

#[tokio::test]
async fn test_repeat_stops_at_failed_iteration() {
    let log = log();
    let recorder = Recorder::new("step", 5, &log).failing_on(2);
    let calls = recorder.calls.clone();
    let spec = TaskSpec::repeat(RepeatPolicy::times(3), recorder.spec()).named("loop");
    let (runner, _) = runner(spec);

    let summary = runner.run().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.state, TaskState::Errored);
    assert_eq!(snapshot.iteration, Some(2));

    let failure = summary
        .records
        .iter()
        .find(|r| r.name == "loop")
        .and_then(|r| r.failure.clone());
    assert_eq!(
        failure,
        Some(Failure::Iteration {
            index: 2,
            reason: "step failed".to_string()
        })
    );
    // one record per iteration of the child
    let step_records: Vec<_> = summary
        .records
        .iter()
        .filter(|r| r.name == "step")
        .map(|r| r.state)
        .collect();
    assert_eq!(step_records, vec![TaskState::Finished, TaskState::Errored]);
}

#[tokio::test]
async fn test_repeat_runs_every_iteration() {
    let log = log();
    let recorder = Recorder::new("step", 1, &log);
    let calls = recorder.calls.clone();
    let (runner, _) = runner(TaskSpec::repeat(RepeatPolicy::times(3), recorder.spec()));

    let summary = runner.run().await.unwrap();
    assert!(summary.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.iteration, Some(3));
    assert_eq!(snapshot.output.as_deref(), Some("3 iterations"));
}

#[tokio::test]
async fn test_repeat_while_condition_stops_when_false() {
    let log = log();
    let recorder = Recorder::new("step", 1, &log);
    let calls = recorder.calls.clone();
    let condition = Countdown::new(3);
    let checks = condition.checks.clone();
    let policy = RepeatPolicy {
        condition: Some(Arc::new(condition)),
        ..Default::default()
    };
    let (runner, _) = runner(TaskSpec::repeat(policy, recorder.spec()));

    let summary = runner.run().await.unwrap();
    assert!(summary.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // checked before each iteration, including the one that stops the loop
    assert_eq!(checks.load(Ordering::SeqCst), 4);
    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.output.as_deref(), Some("3 iterations"));
}

#[tokio::test(start_paused = true)]
async fn test_repeat_duration_stops_starting_iterations() {
    let log = log();
    let recorder = Recorder::new("step", 30, &log);
    let calls = recorder.calls.clone();
    let policy = RepeatPolicy {
        duration: Some(Duration::from_millis(100)),
        ..Default::default()
    };
    let (runner, _) = runner(TaskSpec::repeat(policy, recorder.spec()));

    let summary = runner.run().await.unwrap();
    assert!(summary.is_success());
    // iterations start at 0, 30, 60 and 90 ms; the one at 90 runs to the end
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(entries(&log).last().map(String::as_str), Some("end step"));
    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.output.as_deref(), Some("4 iterations"));
}

#[tokio::test]
async fn test_repeat_condition_failure_errors_repeat() {
    let log = log();
    let recorder = Recorder::new("step", 1, &log);
    let calls = recorder.calls.clone();
    let policy = RepeatPolicy {
        count: Some(3),
        condition: Some(Arc::new(Unreadable)),
        ..Default::default()
    };
    let (runner, _) = runner(TaskSpec::repeat(policy, recorder.spec()).named("loop"));

    let summary = runner.run().await.unwrap();
    assert!(!summary.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let snapshot = runner.snapshot().unwrap();
    assert_eq!(snapshot.state, TaskState::Errored);
    assert_eq!(
        snapshot.failure,
        Some(Failure::action("balance query failed"))
    );
    assert_eq!(snapshot.children[0].state, TaskState::Pending);
}

#[tokio::test]
async fn test_deploy_token_output_names_contract() {
    let chain = Arc::new(MockChain::with_confirmation_delay(2));
    let spec = TaskSpec::leaf(DeployToken {
        name: Some("Extra".into()),
        symbol: Some("EXT".into()),
    });
    let runner = ScenarioRunner::from_spec("deploy", settings(), chain.clone(), account(), spec);

    let summary = runner.run().await.unwrap();
    assert!(summary.is_success());

    // the run token is deployed first, the task's contract second
    let output = runner.snapshot().unwrap().output.unwrap();
    assert!(
        output.starts_with("Deployed Extra (EXT) at 0x"),
        "{}",
        output
    );
    let address = output.rsplit(' ').next().unwrap();
    let address = Address::parse(address).unwrap();
    assert_ne!(Some(&address), runner.token());
}

#[tokio::test]
async fn test_conditional_false_skips_children() {
    let log = log();
    let spec = TaskSpec::sequential(vec![
        TaskSpec::conditional(Always(false), vec![Recorder::new("skipped", 1, &log).spec()]),
        TaskSpec::conditional(Always(true), vec![Recorder::new("ran", 1, &log).spec()]),
    ]);
    let (runner, _) = runner(spec);

    let summary = runner.run().await.unwrap();
    assert!(summary.is_success());

    let snapshot = runner.snapshot().unwrap();
    let skipped = &snapshot.children[0];
    assert_eq!(skipped.state, TaskState::Finished);
    assert_eq!(skipped.output.as_deref(), Some("skipped"));
    assert_eq!(skipped.children[0].state, TaskState::Pending);
    assert_eq!(snapshot.children[1].children[0].state, TaskState::Finished);
    assert_eq!(entries(&log), vec!["start ran", "end ran"]);
}

#[tokio::test]
async fn test_unconfirmed_transaction_errors_leaf() {
    let token = Address::parse("0x00000000000000000000000000000000000000ee").unwrap();
    let chain = Arc::new(MockChain::with_confirmation_delay(u32::MAX));
    chain.deploy_code(&token);

    let spec = TaskSpec::leaf(Mint {
        amount: 5,
        token: None,
    });
    let settings = RunSettings {
        confirmation_timeout: Duration::from_millis(100),
        ..settings()
    };
    let runner = ScenarioRunner::from_spec("timeout", settings, chain.clone(), account(), spec)
        .with_token(TokenConfig {
            address: Some(token),
            ..Default::default()
        });

    let summary = runner.run().await.unwrap();
    assert_eq!(chain.submitted().len(), 1);
    let errors = summary.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].failure,
        Some(Failure::ConfirmationTimeout(ref ids)) if ids.len() == 1
    ));
    assert_eq!(summary.assertion_errors().len(), 1);
}

#[tokio::test]
async fn test_malformed_spec_aborts_before_any_transaction() {
    let (runner, chain) = runner(TaskSpec::repeat(
        RepeatPolicy::default(),
        TaskSpec::sequential(Vec::new()),
    ));
    let err = runner.run().await.unwrap_err();
    assert!(matches!(err, Error::MalformedScenario(_)));
    assert!(chain.submitted().is_empty());
    assert!(runner.tree().is_none());
}

#[tokio::test]
async fn test_runner_runs_once() {
    let log = log();
    let (runner, _) = runner(Recorder::new("a", 1, &log).spec());
    runner.run().await.unwrap();
    assert!(matches!(runner.run().await, Err(Error::Internal(_))));
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let log = log();
    let (sink, mut events) = ChannelSink::new();
    let chain = Arc::new(MockChain::new());
    let spec = TaskSpec::sequential(vec![Recorder::new("a", 1, &log).spec()]).named("root");
    let runner = ScenarioRunner::from_spec("events", settings(), chain, account(), spec)
        .with_events(Arc::new(sink));
    runner.run().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(&seen[0], TaskEvent::Started { name, .. } if name == "root"));
    assert!(matches!(&seen[1], TaskEvent::Started { name, .. } if name == "a"));
    assert!(matches!(
        seen.last(),
        Some(TaskEvent::Finished { name, state: TaskState::Finished, .. }) if name == "root"
    ));
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_abort_keeps_partial_summary() {
    let log = log();
    let spec = TaskSpec::parallel(vec![
        Recorder::new("quick", 1, &log).spec(),
        Recorder::new("slow", 60_000, &log).spec(),
    ]);
    let (runner, _) = runner(spec);

    let handle = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });
    while !entries(&log).contains(&"end quick".to_string()) {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    // let the quick task's termination be recorded
    while runner.partial_summary().records.is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    runner.abort();
    assert!(handle.await.unwrap().is_err());

    let summary = runner.partial_summary();
    assert!(summary.aborted);
    assert!(!summary.is_success());
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].name, "quick");
    assert_eq!(summary.status.running_task_count, 2);
}
