//! Terminal output for scenario runs

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::engine::{render_tree, RenderStyle, RunSummary, ScenarioRunner, TaskEvent};
use crate::tasks::TaskSnapshot;

/// Spinner with the run's live task counts
///
/// Errored tasks are printed above the spinner as they happen.
pub struct LiveDisplay {
    bar: ProgressBar,
    handle: JoinHandle<()>,
}

impl LiveDisplay {
    pub fn start(
        runner: Arc<ScenarioRunner>,
        mut events: UnboundedReceiver<TaskEvent>,
        refresh: Duration,
    ) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(refresh);

        let display = bar.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        display.set_message(runner.status().to_string());
                    }
                    event = events.recv() => match event {
                        Some(TaskEvent::Finished { name, failure: Some(failure), .. }) => {
                            display.println(format!("  {} {}: {}", "✗".red(), name, failure));
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        });

        Self { bar, handle }
    }

    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
        self.bar.finish_and_clear();
    }
}

/// Print the final task tree and the run's outcome
pub fn print_summary(summary: &RunSummary, snapshot: Option<&TaskSnapshot>) {
    if let Some(snapshot) = snapshot {
        println!("\n{}", "Tasks:".cyan());
        for line in render_tree(snapshot, RenderStyle::Colored).lines() {
            println!("  {}", line);
        }
    }

    println!(
        "\n{} finished, {} errored, {} pending, {} running ({:.1}s)",
        summary.status.finished.to_string().green(),
        summary.status.errored.to_string().red(),
        summary.status.pending,
        summary.status.running_task_count,
        summary.elapsed.as_secs_f64()
    );

    let errors = summary.assertion_errors();
    if !errors.is_empty() {
        println!("\n{}", "Errors:".cyan());
        for error in &errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if summary.aborted {
        println!("\n{}", "Run aborted".yellow().bold());
    } else if summary.is_success() {
        println!(
            "\n{} {}",
            "✓".green().bold(),
            format!("Scenario '{}' passed", summary.scenario).green().bold()
        );
    } else {
        println!(
            "\n{} {}",
            "✗".red().bold(),
            format!(
                "Scenario '{}' failed with {} errored task(s)",
                summary.scenario,
                summary.errors().len()
            )
            .red()
            .bold()
        );
    }
}
