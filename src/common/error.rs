//! Error types for the scenario player
//!
//! Only `MalformedScenario` and `InvalidTransition` abort a run. Action
//! failures and confirmation timeouts are recorded on the task that produced
//! them and collected into the run summary instead.

use std::io;
use thiserror::Error;

use crate::chain::TxId;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scenario player
#[derive(Error, Debug)]
pub enum Error {
    // === Scenario Errors ===
    #[error("Malformed scenario: {0}")]
    MalformedScenario(String),

    #[error("Failed to parse scenario: {0}")]
    ScenarioParse(String),

    // === Engine Errors ===
    #[error("Invalid transition for task {task}: cannot {action} while {state}")]
    InvalidTransition {
        task: String,
        action: String,
        state: String,
    },

    #[error("Timeout waiting for transactions: {}", join_ids(.0))]
    ConfirmationTimeout(Vec<TxId>),

    // === Chain Errors ===
    #[error("No contract code at {address} for {what}")]
    ContractNotDeployed { address: String, what: String },

    #[error("RPC request '{method}' failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Chain client error: {0}")]
    Chain(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_ids(ids: &[TxId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a malformed scenario error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedScenario(message.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(task: &str, action: &str, state: &str) -> Self {
        Self::InvalidTransition {
            task: task.to_string(),
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create an RPC error
    pub fn rpc(method: &str, message: impl Into<String>) -> Self {
        Self::Rpc {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedScenario(_) | Self::InvalidTransition { .. }
        )
    }
}
