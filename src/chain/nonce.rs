//! Serialized nonce assignment for the run account

use tokio::sync::Mutex;

use crate::common::Result;

use super::{Account, ChainClient, Transaction, TxId};

/// Assigns nonces for one account under mutual exclusion
///
/// The lock is held across submission so a nonce is only consumed once the
/// node has accepted the transaction; concurrent tasks queue up behind it.
#[derive(Debug)]
pub struct NonceManager {
    account: Account,
    /// `None` until the first submission reads the account's count
    next: Mutex<Option<u64>>,
}

impl NonceManager {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            next: Mutex::new(None),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Fill in the next nonce and submit the transaction
    pub async fn submit(&self, chain: &dyn ChainClient, mut tx: Transaction) -> Result<TxId> {
        let mut next = self.next.lock().await;
        let nonce = match *next {
            Some(nonce) => nonce,
            None => chain.transaction_count(self.account.address()).await?,
        };
        tx.nonce = Some(nonce);
        match chain.submit(&tx).await {
            Ok(id) => {
                tracing::debug!(nonce, tx = %id, "Submitted transaction");
                *next = Some(nonce + 1);
                Ok(id)
            }
            Err(e) => {
                // Re-read the count on the next submission in case another
                // sender used the account.
                *next = None;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chain::{Address, MockChain};

    #[tokio::test]
    async fn test_concurrent_submissions_get_unique_sequential_nonces() {
        let chain = Arc::new(MockChain::new());
        let account = Account::new(Address::parse(&format!("0x{:040x}", 1)).unwrap());
        let token = Address::parse(&format!("0x{:040x}", 0xee)).unwrap();
        let nonces = Arc::new(NonceManager::new(account.clone()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let chain = chain.clone();
            let nonces = nonces.clone();
            let tx = Transaction::mint(account.address().clone(), token.clone(), 1);
            handles.push(tokio::spawn(async move {
                nonces.submit(chain.as_ref(), tx).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut assigned: Vec<u64> = chain
            .submitted()
            .iter()
            .map(|tx| tx.nonce.unwrap())
            .collect();
        assigned.sort_unstable();
        assert_eq!(assigned, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_resyncs_after_rejected_submission() {
        let chain = MockChain::new();
        let account = Account::new(Address::parse(&format!("0x{:040x}", 1)).unwrap());
        let token = Address::parse(&format!("0x{:040x}", 0xee)).unwrap();
        let nonces = NonceManager::new(account.clone());
        let mint = || Transaction::mint(account.address().clone(), token.clone(), 1);

        // Another sender already used nonce 0: the first read picks that up.
        chain.submit(&mint()).await.unwrap();
        nonces.submit(&chain, mint()).await.unwrap();
        assert_eq!(chain.submitted().last().unwrap().nonce, Some(1));

        // Nonce 2 is taken behind our back, so the cached value is rejected...
        chain.submit(&mint()).await.unwrap();
        assert!(nonces.submit(&chain, mint()).await.is_err());

        // ...and the next submission reads the count again.
        nonces.submit(&chain, mint()).await.unwrap();
        assert_eq!(chain.submitted().last().unwrap().nonce, Some(3));
    }
}
