//! Per-task view of the run's shared resources

use std::sync::{Arc, Mutex, PoisonError};

use crate::chain::{Account, Address, ChainClient, NonceManager, SharedChain, Transaction, TxId};
use crate::common::Result;
use crate::tasks::{Failure, TaskId};

/// What a leaf action can reach while it runs
///
/// One context is created per leaf execution. It owns the leaf's pending
/// transaction set: every transaction submitted through it is waited on by
/// the scheduler before the leaf may finish.
pub struct ActionContext {
    task: TaskId,
    chain: SharedChain,
    nonces: Arc<NonceManager>,
    token: Option<Address>,
    pending: Mutex<Vec<TxId>>,
}

impl ActionContext {
    pub fn new(
        task: TaskId,
        chain: SharedChain,
        nonces: Arc<NonceManager>,
        token: Option<Address>,
    ) -> Self {
        Self {
            task,
            chain,
            nonces,
            token,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn chain(&self) -> &dyn ChainClient {
        self.chain.as_ref()
    }

    pub fn account(&self) -> &Account {
        self.nonces.account()
    }

    /// The token to act on: the explicit one, else the run's token
    pub fn token(&self, explicit: Option<&Address>) -> std::result::Result<Address, Failure> {
        explicit
            .or(self.token.as_ref())
            .cloned()
            .ok_or_else(|| Failure::action("No token address available for this task"))
    }

    /// Submit a transaction from the run account
    ///
    /// The transaction joins this task's pending set.
    pub async fn submit(&self, tx: Transaction) -> Result<TxId> {
        let fee = self.chain.estimate_fee(&tx).await?;
        tracing::debug!(task = %self.task, fee, "Submitting transaction");

        let id = self.nonces.submit(self.chain.as_ref(), tx).await?;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.clone());
        Ok(id)
    }

    /// Transactions submitted so far
    pub fn pending(&self) -> Vec<TxId> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
