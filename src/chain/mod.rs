//! Chain access for scenario tasks
//!
//! The engine talks to the ledger only through [`ChainClient`]. Two clients
//! ship with the crate: [`JsonRpcClient`] for a live node and [`MockChain`],
//! an in-memory ledger used for dry runs and tests.

pub mod abi;
pub mod mock;
pub mod nonce;
pub mod resolver;
pub mod rpc;
pub mod waiter;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

pub use mock::MockChain;
pub use nonce::NonceManager;
pub use resolver::{ContractResolver, TokenConfig};
pub use rpc::JsonRpcClient;
pub use waiter::ConfirmationWaiter;

/// Identifier of a submitted transaction (its hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 20-byte account or contract address, stored as lowercase `0x` hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse a `0x`-prefixed 40 hex digit address
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| Error::Config(format!("Address '{}' must start with 0x", s)))?;
        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Config(format!(
                "Address '{}' must be 40 hex digits",
                s
            )));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the `0x` prefix
    pub fn digits(&self) -> &str {
        &self.0[2..]
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusion state of a transaction as seen by the chain node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionStatus {
    /// Known to the node but not mined yet
    Pending,
    /// Mined in the given block
    Included { block_number: u64 },
    /// Not known to the node (dropped, or not propagated yet)
    Unknown,
}

/// What a transaction does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Token `transfer(to, amount)` on the transaction's target contract
    TokenTransfer { to: Address, amount: u128 },
    /// Token `mint(amount)` credited to the sender
    Mint { amount: u128 },
    /// Deploy a new token contract
    DeployToken { name: String, symbol: String },
}

/// An outgoing transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    /// Target contract or account; `None` deploys a contract
    pub to: Option<Address>,
    pub payload: Payload,
    /// Filled in by the [`NonceManager`] right before submission
    pub nonce: Option<u64>,
}

impl Transaction {
    pub fn token_transfer(from: Address, token: Address, to: Address, amount: u128) -> Self {
        Self {
            from,
            to: Some(token),
            payload: Payload::TokenTransfer { to, amount },
            nonce: None,
        }
    }

    pub fn mint(from: Address, token: Address, amount: u128) -> Self {
        Self {
            from,
            to: Some(token),
            payload: Payload::Mint { amount },
            nonce: None,
        }
    }

    pub fn deploy_token(from: Address, name: String, symbol: String) -> Self {
        Self {
            from,
            to: None,
            payload: Payload::DeployToken { name, symbol },
            nonce: None,
        }
    }
}

/// Account the scenario acts as
///
/// The signing key stays with the chain node; the player only needs the
/// address to fill in `from` and to track nonces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    address: Address,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

/// Ledger operations used by the engine
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit a transaction and return its id
    async fn submit(&self, tx: &Transaction) -> Result<TxId>;

    /// Query whether a transaction has been mined
    async fn inclusion_status(&self, id: &TxId) -> Result<InclusionStatus>;

    /// Estimated cost of a transaction in wei
    async fn estimate_fee(&self, tx: &Transaction) -> Result<u128>;

    /// Number of transactions sent from an address, including pending ones
    async fn transaction_count(&self, address: &Address) -> Result<u64>;

    /// Whether a contract is deployed at the address
    async fn has_code(&self, address: &Address) -> Result<bool>;

    /// Address of the contract created by a mined deployment
    async fn contract_address(&self, id: &TxId) -> Result<Option<Address>>;

    /// Token balance of `owner`
    async fn token_balance(&self, token: &Address, owner: &Address) -> Result<u128>;
}

/// Chain client shared between concurrently running tasks
pub type SharedChain = Arc<dyn ChainClient>;
