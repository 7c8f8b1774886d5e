//! Per-run nonce sequencing.

use std::time::Duration;

use alloy_core::primitives::Address;
use backon::{ExponentialBuilder, Retryable};

use crate::{
    chain::ChainClient,
    error::{Error, Result},
    network::NetworkId,
};

/// Attempts made to read the starting transaction count.
const INIT_MAX_ATTEMPTS: usize = 3;

/// Monotonic nonce counter for one (network, account) pair.
///
/// A cursor is owned by a single run: it is neither `Clone` nor shared. Every
/// nonce whose transaction may have reached the network counts as consumed,
/// whether or not it was confirmed. Only a nonce that was never sent can be
/// given back, with [`NonceCursor::release`].
#[derive(Debug)]
pub struct NonceCursor {
    network: NetworkId,
    account: Address,
    start: u64,
    next: u64,
}

impl NonceCursor {
    /// Read the account's pending transaction count and start counting from it.
    pub async fn init<C: ChainClient>(
        client: &C,
        network: NetworkId,
        account: Address,
    ) -> Result<Self> {
        let start = (|| client.transaction_count(account))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(200))
                    .with_max_times(INIT_MAX_ATTEMPTS),
            )
            .notify(|err, dur| {
                tracing::warn!(error = %err, retry_in = ?dur, %account, "Failed to read transaction count, retrying...");
            })
            .await
            .map_err(|e| Error::rpc(format!("failed to read transaction count of {account}: {e:#}")))?;

        tracing::debug!(%network, %account, nonce = start, "Nonce cursor initialised");

        Ok(Self::starting_at(network, account, start))
    }

    pub fn starting_at(network: NetworkId, account: Address, start: u64) -> Self {
        Self {
            network,
            account,
            start,
            next: start,
        }
    }

    /// Return the current nonce and advance by one.
    pub fn next(&mut self) -> u64 {
        let nonce = self.next;
        self.next += 1;
        nonce
    }

    /// Give back `nonce` when its transaction never left the process.
    ///
    /// Only the most recently issued nonce can be released; anything else is
    /// ignored so the sequence stays gapless.
    pub fn release(&mut self, nonce: u64) -> bool {
        if nonce + 1 == self.next && nonce >= self.start {
            self.next = nonce;
            tracing::debug!(network = %self.network, account = %self.account, nonce, "Nonce released");
            true
        } else {
            false
        }
    }

    /// The nonce the next submission will use.
    pub fn peek(&self) -> u64 {
        self.next
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of nonces handed out so far.
    pub fn consumed(&self) -> u64 {
        self.next - self.start
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn account(&self) -> Address {
        self.account
    }
}
