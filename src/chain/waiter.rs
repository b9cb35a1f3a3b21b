//! Waiting for transactions to be mined

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::common::config::Timeouts;
use crate::common::{Error, Result};

use super::{InclusionStatus, SharedChain, TxId};

/// Polls the chain until a set of transactions is mined or a deadline passes
#[derive(Clone)]
pub struct ConfirmationWaiter {
    chain: SharedChain,
    poll_interval: Duration,
    status_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(chain: SharedChain, timeouts: &Timeouts) -> Self {
        Self {
            chain,
            poll_interval: timeouts.poll_interval(),
            status_interval: timeouts.status_log_interval(),
        }
    }

    pub fn with_intervals(chain: SharedChain, poll: Duration, status: Duration) -> Self {
        Self {
            chain,
            poll_interval: poll,
            status_interval: status,
        }
    }

    /// Wait until every transaction in `ids` is included in a block
    ///
    /// Fails with `ConfirmationTimeout` naming the transactions still
    /// unconfirmed once `timeout` has elapsed. A failed query is logged and
    /// retried on the next poll.
    pub async fn wait(&self, ids: &[TxId], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut outstanding: BTreeSet<TxId> = ids.iter().cloned().collect();
        let mut last_count = usize::MAX;
        let mut last_log = Instant::now();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if outstanding.len() != last_count || last_log.elapsed() >= self.status_interval {
                tracing::debug!(
                    outstanding = outstanding.len(),
                    timeout_remaining = remaining.as_secs(),
                    "Waiting for tx confirmations"
                );
                last_count = outstanding.len();
                last_log = Instant::now();
            }

            for id in outstanding.clone() {
                match self.chain.inclusion_status(&id).await {
                    Ok(InclusionStatus::Included { block_number }) => {
                        tracing::trace!(tx = %id, block_number, "Transaction confirmed");
                        outstanding.remove(&id);
                    }
                    Ok(InclusionStatus::Pending) | Ok(InclusionStatus::Unknown) => {}
                    Err(e) => {
                        tracing::warn!(tx = %id, error = %e, "Inclusion query failed");
                    }
                }
            }

            if outstanding.is_empty() {
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::ConfirmationTimeout(outstanding.into_iter().collect()));
            }
            sleep(self.poll_interval.min(remaining)).await;
        }
    }
}
