//! In-memory ledger
//!
//! Behaves like a chain node closely enough for dry runs and tests:
//! transactions are checked for nonce order, mined after a configurable
//! number of inclusion queries, and token effects are applied when mined.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::common::{Error, Result};

use super::{Address, ChainClient, InclusionStatus, Payload, Transaction, TxId};

/// Fee reported for every transaction
const MOCK_FEE: u128 = 21_000;

#[derive(Debug)]
struct MockTx {
    tx: Option<Transaction>,
    queries: u32,
    /// Pending queries before the transaction is mined; `None` never mines
    confirm_after: Option<u32>,
    block: Option<u64>,
    created: Option<Address>,
}

#[derive(Debug, Default)]
struct MockState {
    next_tx: u64,
    next_contract: u64,
    block_number: u64,
    confirm_after: u32,
    failing_queries: u32,
    txs: HashMap<TxId, MockTx>,
    nonces: HashMap<Address, u64>,
    code: HashSet<Address>,
    balances: HashMap<(Address, Address), u128>,
    submitted: Vec<Transaction>,
}

impl MockState {
    fn next_tx_id(&mut self) -> TxId {
        self.next_tx += 1;
        TxId::new(format!("0x{:064x}", self.next_tx))
    }

    fn mine(&mut self, id: &TxId) -> Result<()> {
        self.block_number += 1;
        let block = self.block_number;
        let mut created = None;
        let tx = match self.txs.get(id).and_then(|t| t.tx.clone()) {
            Some(tx) => tx,
            None => {
                if let Some(entry) = self.txs.get_mut(id) {
                    entry.block = Some(block);
                }
                return Ok(());
            }
        };

        match (&tx.payload, &tx.to) {
            (Payload::TokenTransfer { to, amount }, Some(token)) => {
                let from_key = (token.clone(), tx.from.clone());
                let balance = self.balances.get(&from_key).copied().unwrap_or(0);
                // Insufficient balance reverts; the transaction is still mined.
                if balance >= *amount {
                    self.balances.insert(from_key, balance - amount);
                    *self.balances.entry((token.clone(), to.clone())).or_insert(0) += amount;
                }
            }
            (Payload::Mint { amount }, Some(token)) => {
                *self
                    .balances
                    .entry((token.clone(), tx.from.clone()))
                    .or_insert(0) += amount;
            }
            (Payload::DeployToken { .. }, None) => {
                self.next_contract += 1;
                let address = Address::parse(&format!("0x{:040x}", 0xc0de_0000 + self.next_contract))?;
                self.code.insert(address.clone());
                created = Some(address);
            }
            _ => {}
        }

        if let Some(entry) = self.txs.get_mut(id) {
            entry.block = Some(block);
            entry.created = created;
        }
        Ok(())
    }
}

/// In-memory chain client
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    /// A chain that mines every transaction on its first inclusion query
    pub fn new() -> Self {
        Self::default()
    }

    /// Mine transactions only after `queries` pending inclusion queries
    pub fn with_confirmation_delay(queries: u32) -> Self {
        let chain = Self::default();
        chain.lock().confirm_after = queries;
        chain
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a transaction that was submitted outside the player
    ///
    /// It is mined after `confirm_after` pending queries, or never for `None`.
    pub fn insert_pending(&self, confirm_after: Option<u32>) -> TxId {
        let mut state = self.lock();
        let id = state.next_tx_id();
        state.txs.insert(
            id.clone(),
            MockTx {
                tx: None,
                queries: 0,
                confirm_after,
                block: None,
                created: None,
            },
        );
        id
    }

    /// Make the next `count` inclusion queries fail with a transport error
    pub fn fail_next_queries(&self, count: u32) {
        self.lock().failing_queries = count;
    }

    /// Pretend a contract is deployed at `address`
    pub fn deploy_code(&self, address: &Address) {
        self.lock().code.insert(address.clone());
    }

    pub fn set_token_balance(&self, token: &Address, owner: &Address, amount: u128) {
        self.lock()
            .balances
            .insert((token.clone(), owner.clone()), amount);
    }

    /// Transactions accepted so far, in submission order
    pub fn submitted(&self) -> Vec<Transaction> {
        self.lock().submitted.clone()
    }

    /// Number of inclusion queries made for a transaction
    pub fn queries(&self, id: &TxId) -> u32 {
        self.lock().txs.get(id).map(|t| t.queries).unwrap_or(0)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn submit(&self, tx: &Transaction) -> Result<TxId> {
        let mut state = self.lock();
        let expected = state.nonces.get(&tx.from).copied().unwrap_or(0);
        let nonce = tx.nonce.unwrap_or(expected);
        if nonce != expected {
            return Err(Error::Chain(format!(
                "Invalid nonce {} for {}: expected {}",
                nonce, tx.from, expected
            )));
        }
        state.nonces.insert(tx.from.clone(), expected + 1);

        let id = state.next_tx_id();
        let confirm_after = Some(state.confirm_after);
        state.txs.insert(
            id.clone(),
            MockTx {
                tx: Some(tx.clone()),
                queries: 0,
                confirm_after,
                block: None,
                created: None,
            },
        );
        state.submitted.push(tx.clone());
        Ok(id)
    }

    async fn inclusion_status(&self, id: &TxId) -> Result<InclusionStatus> {
        let mut state = self.lock();
        if state.failing_queries > 0 {
            state.failing_queries -= 1;
            return Err(Error::Chain("connection reset by peer".to_string()));
        }

        let (queries, confirm_after, block) = match state.txs.get_mut(id) {
            Some(entry) => {
                entry.queries += 1;
                (entry.queries, entry.confirm_after, entry.block)
            }
            None => return Ok(InclusionStatus::Unknown),
        };

        if let Some(block_number) = block {
            return Ok(InclusionStatus::Included { block_number });
        }
        match confirm_after {
            Some(after) if queries > after => {
                state.mine(id)?;
                Ok(InclusionStatus::Included {
                    block_number: state.block_number,
                })
            }
            _ => Ok(InclusionStatus::Pending),
        }
    }

    async fn estimate_fee(&self, _tx: &Transaction) -> Result<u128> {
        Ok(MOCK_FEE)
    }

    async fn transaction_count(&self, address: &Address) -> Result<u64> {
        Ok(self.lock().nonces.get(address).copied().unwrap_or(0))
    }

    async fn has_code(&self, address: &Address) -> Result<bool> {
        Ok(self.lock().code.contains(address))
    }

    async fn contract_address(&self, id: &TxId) -> Result<Option<Address>> {
        Ok(self.lock().txs.get(id).and_then(|t| t.created.clone()))
    }

    async fn token_balance(&self, token: &Address, owner: &Address) -> Result<u128> {
        Ok(self
            .lock()
            .balances
            .get(&(token.clone(), owner.clone()))
            .copied()
            .unwrap_or(0))
    }
}
