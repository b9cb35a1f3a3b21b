//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Chain connection settings
    #[serde(default)]
    pub chain: ChainConfig,

    /// Timeout and polling settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Live display settings
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Gas price policy for outgoing transactions
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(untagged)]
pub enum GasPrice {
    /// Fixed price in wei
    Fixed(u64),
    /// Named strategy
    Strategy(GasStrategy),
    /// Let the node decide
    #[default]
    #[serde(skip)]
    Node,
}

/// Named gas price strategies
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GasStrategy {
    /// Twice the node's current gas price
    Fast,
    /// The node's current gas price
    Medium,
}

/// Chain connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Timeout for a single RPC request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Gas price policy
    #[serde(default)]
    pub gas_price: GasPrice,

    /// Hex deployment bytecode of the test token contract
    pub token_bytecode_file: Option<PathBuf>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            request_timeout_secs: default_request_timeout(),
            gas_price: GasPrice::default(),
            token_bytecode_file: None,
        }
    }
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// How long a task may wait for its transactions to be mined
    #[serde(default = "default_confirmation")]
    pub confirmation_secs: u64,

    /// Interval between inclusion queries
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Interval between "still waiting" log lines
    #[serde(default = "default_status_log")]
    pub status_log_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            confirmation_secs: default_confirmation(),
            poll_interval_ms: default_poll_interval(),
            status_log_secs: default_status_log(),
        }
    }
}

impl Timeouts {
    pub fn confirmation(&self) -> Duration {
        Duration::from_secs(self.confirmation_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn status_log_interval(&self) -> Duration {
        Duration::from_secs(self.status_log_secs)
    }
}

fn default_confirmation() -> u64 {
    180
}
fn default_poll_interval() -> u64 {
    100
}
fn default_status_log() -> u64 {
    10
}

/// Scheduler settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SchedulerConfig {
    /// Default concurrency cap for parallel groups without their own
    pub max_parallel: Option<usize>,
}

/// Live display settings
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// Refresh interval of the status line
    #[serde(default = "default_refresh")]
    pub refresh_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh(),
        }
    }
}

fn default_refresh() -> u64 {
    125
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chain.rpc_url, "http://localhost:8545");
        assert_eq!(config.timeouts.confirmation_secs, 180);
        assert_eq!(config.timeouts.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.display.refresh_ms, 125);
        assert_eq!(config.chain.gas_price, GasPrice::Node);
        assert!(config.scheduler.max_parallel.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[chain]
rpc_url = "http://node:8545"
gas_price = "fast"

[timeouts]
confirmation_secs = 60

[scheduler]
max_parallel = 4
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.chain.rpc_url, "http://node:8545");
        assert_eq!(config.chain.gas_price, GasPrice::Strategy(GasStrategy::Fast));
        assert_eq!(config.timeouts.confirmation_secs, 60);
        assert_eq!(config.timeouts.poll_interval_ms, 100);
        assert_eq!(config.scheduler.max_parallel, Some(4));
    }

    #[test]
    fn test_fixed_gas_price() {
        let config: Config = toml::from_str("[chain]\ngas_price = 20000000000\n").unwrap();
        assert_eq!(config.chain.gas_price, GasPrice::Fixed(20_000_000_000));
    }

    #[test]
    fn test_invalid_file_is_config_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\nconfirmation_secs = \"soon\"").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
