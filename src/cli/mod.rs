//! CLI command handling
//!
//! Loads scenarios and configuration, runs the engine and formats output.

mod display;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::chain::{Account, Address, JsonRpcClient, MockChain, SharedChain};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::engine::{
    render_tree, ChannelSink, FanoutSink, RenderStyle, RunSettings, ScenarioRunner, TracingSink,
};
use crate::scenario::Scenario;

/// Account used by `--simulate` when none is given
const SIMULATED_ACCOUNT: &str = "0x00000000000000000000000000000000000000a0";

/// Inclusion queries before the simulated chain mines a transaction
const SIMULATED_CONFIRMATION_DELAY: u32 = 3;

/// Dispatch a CLI command
///
/// Returns whether the command succeeded; a run with errored tasks is not
/// an error of the command itself.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            scenario,
            rpc_url,
            account,
            simulate,
            no_live,
            config,
        } => {
            let options = RunOptions {
                rpc_url,
                account,
                simulate,
                live: !no_live && std::io::stderr().is_terminal(),
                config,
            };
            run(&scenario, options).await
        }

        Commands::Validate { scenario } => {
            logging::init_cli();
            let loaded = Scenario::from_file(&scenario)?;
            let tree = loaded.build_tree()?;
            println!(
                "{} {} ({} tasks)",
                "✓".green(),
                loaded.name.white().bold(),
                tree.len()
            );
            Ok(true)
        }

        Commands::Tree { scenario } => {
            logging::init_cli();
            let tree = Scenario::from_file(&scenario)?.build_tree()?;
            print!("{}", render_tree(&tree.snapshot(), RenderStyle::Plain));
            Ok(true)
        }
    }
}

struct RunOptions {
    rpc_url: Option<String>,
    account: Option<String>,
    simulate: bool,
    live: bool,
    config: Option<PathBuf>,
}

async fn run(path: &Path, options: RunOptions) -> Result<bool> {
    let (log_file, _guard) = logging::init_run(path, options.live);

    let mut config = match &options.config {
        Some(config_path) => Config::load_from(config_path)?,
        None => Config::load()?,
    };
    if let Some(url) = options.rpc_url {
        config.chain.rpc_url = url;
    }

    let scenario = Scenario::from_file(path)?;
    let (chain, account) = connect(&config, options.account.as_deref(), options.simulate)?;

    println!(
        "\n{} {}",
        "Running Scenario:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }
    if options.simulate {
        println!("  {}", "Simulated chain".dimmed());
    } else {
        println!("  Node: {}", config.chain.rpc_url.dimmed());
    }
    println!("  Account: {}", account.address().to_string().dimmed());

    let (sink, events) = ChannelSink::new();
    let runner = Arc::new(
        ScenarioRunner::new(RunSettings::from_config(&config), chain, account, scenario)
            .with_events(Arc::new(FanoutSink::new(vec![
                Box::new(TracingSink),
                Box::new(sink),
            ]))),
    );

    let live = options.live.then(|| {
        display::LiveDisplay::start(
            runner.clone(),
            events,
            Duration::from_millis(config.display.refresh_ms),
        )
    });

    let outcome = tokio::select! {
        result = runner.run() => result,
        _ = tokio::signal::ctrl_c() => {
            runner.abort();
            Ok(runner.partial_summary())
        }
    };

    if let Some(live) = live {
        live.stop().await;
    }

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(snapshot) = runner.snapshot() {
                print!("{}", render_tree(&snapshot, RenderStyle::Colored));
            }
            return Err(e);
        }
    };

    display::print_summary(&summary, runner.snapshot().as_ref());
    if let Some(log_file) = log_file {
        println!("  Log: {}", log_file.display().to_string().dimmed());
    }
    Ok(summary.is_success())
}

fn connect(config: &Config, account: Option<&str>, simulate: bool) -> Result<(SharedChain, Account)> {
    if simulate {
        let address = Address::parse(account.unwrap_or(SIMULATED_ACCOUNT))?;
        let chain = MockChain::with_confirmation_delay(SIMULATED_CONFIRMATION_DELAY);
        return Ok((Arc::new(chain), Account::new(address)));
    }

    let account = account.ok_or_else(|| {
        Error::Config("--account is required unless --simulate is given".to_string())
    })?;
    let chain = JsonRpcClient::new(&config.chain)?;
    Ok((Arc::new(chain), Account::new(Address::parse(account)?)))
}
