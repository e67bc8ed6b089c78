//! Confirmation polling for one logical transaction.
//!
//! The listener remembers the two most recent broadcast variants: the newest
//! replacement and the one it superseded, which a block producer may already
//! have picked up before the pool saw the replacement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::blockchain::{ChainClient, ChainResult, Receipt, SignedTx};

/// Whether `receipt` succeeded and is buried `confirm_height` blocks deep.
pub fn is_confirmed(receipt: &Receipt, confirm_height: u64, head: u64) -> bool {
    receipt.status && receipt.block_number.saturating_add(confirm_height) <= head
}

/// Ring of the last two broadcast variants.
#[derive(Debug, Default)]
pub struct RecentTxs {
    slots: [Option<SignedTx>; 2],
    pushed: usize,
}

impl RecentTxs {
    pub fn push(&mut self, tx: SignedTx) {
        self.slots[self.pushed % 2] = Some(tx);
        self.pushed += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignedTx> {
        self.slots.iter().flatten()
    }
}

/// Polls receipts until one variant is confirmed or the deadline passes.
pub struct ConfirmationListener {
    client: Arc<dyn ChainClient>,
    confirm_height: u64,
    interval: Duration,
}

impl ConfirmationListener {
    pub fn new(client: Arc<dyn ChainClient>, confirm_height: u64, interval: Duration) -> Self {
        Self {
            client,
            confirm_height,
            interval,
        }
    }

    /// Run until confirmation (returns the mined variant) or `deadline`
    /// (returns `None`). New variants arrive on `broadcasts`.
    pub async fn run(
        self,
        mut broadcasts: mpsc::UnboundedReceiver<SignedTx>,
        deadline: Instant,
    ) -> Option<SignedTx> {
        let mut recent = RecentTxs::default();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expired = sleep_until(deadline);
        tokio::pin!(expired);

        loop {
            tokio::select! {
                Some(tx) = broadcasts.recv() => recent.push(tx),
                _ = ticker.tick() => {
                    if let Some(tx) = self.poll(&recent).await {
                        return Some(tx);
                    }
                }
                _ = &mut expired => {
                    let hashes: Vec<_> = recent.iter().map(|tx| tx.hash).collect();
                    tracing::error!(?hashes, "Transaction not confirmed before deadline");
                    return None;
                }
            }
        }
    }

    async fn poll(&self, recent: &RecentTxs) -> Option<SignedTx> {
        for tx in recent.iter() {
            match self.check(tx).await {
                Ok(true) => return Some(tx.clone()),
                Ok(false) => {}
                Err(e) => tracing::warn!(tx_hash = %tx.hash, error = %e, "Receipt check failed"),
            }
        }
        None
    }

    async fn check(&self, tx: &SignedTx) -> ChainResult<bool> {
        let Some(receipt) = self.client.get_transaction_receipt(tx.hash).await? else {
            tracing::debug!(tx_hash = %tx.hash, "Transaction pending");
            return Ok(false);
        };
        let head = self.client.block_number().await?;

        if !receipt.status {
            // Nonce consumed; only the deadline ends the delivery
            tracing::warn!(tx_hash = %tx.hash, block = receipt.block_number, "Transaction reverted");
            return Ok(false);
        }

        let confirmed = is_confirmed(&receipt, self.confirm_height, head);
        if !confirmed {
            tracing::debug!(
                tx_hash = %tx.hash,
                block = receipt.block_number,
                head,
                required = self.confirm_height,
                "Waiting for confirmations"
            );
        }
        Ok(confirmed)
    }
}
