//! CLI command definitions
//!
//! Defines the clap commands for the scenario player.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario against a chain node
    Run {
        /// Path to the YAML scenario file
        scenario: PathBuf,

        /// JSON-RPC endpoint of the chain node (overrides the config file)
        #[arg(long)]
        rpc_url: Option<String>,

        /// Address to send transactions from; its key must be unlocked on
        /// the node
        #[arg(long)]
        account: Option<String>,

        /// Run against an in-memory chain instead of a node
        #[arg(long)]
        simulate: bool,

        /// Don't show the live status line
        #[arg(long)]
        no_live: bool,

        /// Config file to use instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a scenario file without running it
    Validate {
        /// Path to the YAML scenario file
        scenario: PathBuf,
    },

    /// Print the task tree a scenario builds
    Tree {
        /// Path to the YAML scenario file
        scenario: PathBuf,
    },
}
