//! Logging and tracing configuration
//!
//! Scenario runs log compactly to stderr and in full detail to a per-run
//! log file, so the terminal stays readable while the file keeps every
//! confirmation poll.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::paths;

/// Initialize tracing for one-shot commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scenario_player=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for a scenario run (file + stderr logging)
///
/// The file receives everything down to DEBUG for this crate; stderr only
/// what `RUST_LOG` lets through. Without `RUST_LOG` stderr gets INFO, or
/// only warnings while the live status line owns the terminal. Returns the
/// log file path and the appender guard, which must be kept alive for the
/// duration of the run.
pub fn init_run(scenario: &Path, live: bool) -> (Option<PathBuf>, Option<WorkerGuard>) {
    let default_filter = if live { "warn" } else { "scenario_player=info,warn" };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter);

    let log_dir = match paths::ensure_log_dir() {
        Ok(Some(dir)) => dir,
        Ok(None) => {
            tracing_subscriber::registry().with(stderr_layer).init();
            return (None, None);
        }
        Err(e) => {
            eprintln!("Warning: Could not create log directory: {}", e);
            tracing_subscriber::registry().with(stderr_layer).init();
            return (None, None);
        }
    };

    let file_name = paths::run_log_file_name(scenario);
    let appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(EnvFilter::new("scenario_player=debug,info"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    (Some(log_dir.join(file_name)), Some(guard))
}
