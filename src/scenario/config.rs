//! Scenario file types
//!
//! Defines the data structures for deserializing YAML scenarios.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::chain::{Address, TokenConfig};

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario exercises
    pub description: Option<String>,
    /// Per-scenario overrides of the player configuration
    #[serde(default)]
    pub settings: ScenarioSettings,
    /// Token the scenario runs against
    #[serde(default)]
    pub token: TokenConfig,
    /// Named task subtrees that `use` tasks expand to
    #[serde(default)]
    pub templates: BTreeMap<String, TaskDescription>,
    /// The root task
    pub root: TaskDescription,
}

/// Scenario level overrides
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSettings {
    /// Seconds to wait for a task's transactions to be mined
    pub confirmation_timeout_secs: Option<u64>,
    /// Concurrency cap for parallel groups that set none
    pub max_parallel: Option<usize>,
}

/// A token amount, written as an integer or as a decimal string for values
/// beyond 64 bits
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AmountValue {
    Int(u64),
    Text(String),
}

/// A node of the scenario's task tree
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TaskDescription {
    /// Run tasks one after another, stopping at the first error
    #[serde(alias = "sequential")]
    Serial {
        name: Option<String>,
        tasks: Vec<TaskDescription>,
    },
    /// Run tasks concurrently
    Parallel {
        name: Option<String>,
        /// At most this many tasks run at once
        max_concurrency: Option<usize>,
        /// Keep starting tasks after one has errored
        #[serde(default)]
        continue_on_error: bool,
        tasks: Vec<TaskDescription>,
    },
    /// Run a task repeatedly
    Repeat {
        name: Option<String>,
        /// Number of iterations
        count: Option<u32>,
        /// Stop starting iterations after this many seconds
        duration_secs: Option<u64>,
        /// Stop once this no longer holds
        #[serde(rename = "while")]
        while_condition: Option<ConditionDescription>,
        task: Box<TaskDescription>,
    },
    /// Run tasks in order only if a condition holds
    Conditional {
        name: Option<String>,
        when: ConditionDescription,
        tasks: Vec<TaskDescription>,
    },
    /// Expand a named template
    Use {
        name: Option<String>,
        template: String,
    },
    /// Transfer tokens from the run account
    Transfer {
        name: Option<String>,
        to: Address,
        amount: AmountValue,
        /// Token to use instead of the scenario's token
        token: Option<Address>,
    },
    /// Mint tokens to the run account
    Mint {
        name: Option<String>,
        amount: AmountValue,
        token: Option<Address>,
    },
    /// Deploy an additional token contract
    DeployToken {
        name: Option<String>,
        token_name: Option<String>,
        symbol: Option<String>,
    },
    /// Sleep
    Wait {
        name: Option<String>,
        seconds: f64,
    },
    /// Fail unless an address holds exactly the expected balance
    AssertBalance {
        name: Option<String>,
        address: Address,
        expected: AmountValue,
        token: Option<Address>,
    },
}

impl TaskDescription {
    /// The scenario `type` tag of this node
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Serial { .. } => "serial",
            Self::Parallel { .. } => "parallel",
            Self::Repeat { .. } => "repeat",
            Self::Conditional { .. } => "conditional",
            Self::Use { .. } => "use",
            Self::Transfer { .. } => "transfer",
            Self::Mint { .. } => "mint",
            Self::DeployToken { .. } => "deploy_token",
            Self::Wait { .. } => "wait",
            Self::AssertBalance { .. } => "assert_balance",
        }
    }
}

/// A check on chain state
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "check", rename_all = "snake_case", deny_unknown_fields)]
pub enum ConditionDescription {
    /// Token balance of `address` is at least `amount`
    BalanceAtLeast {
        address: Address,
        amount: AmountValue,
        token: Option<Address>,
    },
    /// Token balance of `address` is below `amount`
    BalanceBelow {
        address: Address,
        amount: AmountValue,
        token: Option<Address>,
    },
    /// Contract code is deployed at `address`
    HasCode { address: Address },
}
