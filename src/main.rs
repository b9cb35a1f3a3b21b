//! Scenario Player - scripted test scenarios for a blockchain payment network
//!
//! Loads a YAML scenario, runs its task tree against a chain node and shows
//! live progress while the run is in progress.

use clap::Parser;
use scenario_player::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "scenario-player", about = "Run test scenarios against a chain node")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
