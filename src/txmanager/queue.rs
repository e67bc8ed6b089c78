//! Deduplicating submission queue on top of [`TxManager`].
//!
//! Each logical operation is identified by a caller-defined key. While a key
//! is pending or finished, further sends for it are ignored; a failed key is
//! resubmitted on the next send.
//!
//! `send` is the only writer moving a key into `Pending`; the background loop
//! fed by the manager's events is the only writer moving it out.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use alloy::primitives::TxHash;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::blockchain::Transaction;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::metrics;
use crate::txmanager::error::TxError;
use crate::txmanager::feed::Subscription;
use crate::txmanager::manager::TxManager;
use crate::txmanager::types::{TxConfirmEvent, TxErrorEvent, TxStatus};

type KeyFn<K> = Box<dyn Fn(&Transaction) -> K + Send + Sync>;

pub struct QueueManager<K> {
    tx_manager: Arc<TxManager>,
    statuses: RwLock<HashMap<K, TxStatus>>,
    /// Must only read fields the manager never changes (not gas price, gas
    /// limit or nonce), since events carry the repriced variant.
    key_fn: KeyFn<K>,
    shutdown: Shutdown,
}

impl<K> QueueManager<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new<F>(tx_manager: Arc<TxManager>, key_fn: F) -> Arc<Self>
    where
        F: Fn(&Transaction) -> K + Send + Sync + 'static,
    {
        Arc::new(Self {
            tx_manager,
            statuses: RwLock::new(HashMap::new()),
            key_fn: Box::new(key_fn),
            shutdown: Shutdown::new(),
        })
    }

    pub fn tx_manager(&self) -> &Arc<TxManager> {
        &self.tx_manager
    }

    /// Launch the status bookkeeping loop.
    ///
    /// The feeds are subscribed before this returns, so no event published
    /// after `start` is missed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let confirms = self.tx_manager.subscribe_confirm_events();
        let errors = self.tx_manager.subscribe_error_events();
        let shutdown = self.shutdown.subscribe();

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(confirms, errors, shutdown).await })
    }

    /// Stop the bookkeeping loop. Deliveries already handed to the manager
    /// keep running.
    pub fn close(&self) {
        self.shutdown.trigger();
    }

    async fn run(
        &self,
        mut confirms: Subscription<TxConfirmEvent>,
        mut errors: Subscription<TxErrorEvent>,
        mut shutdown: ShutdownSignal,
    ) {
        tracing::info!("Queue manager started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                Some(event) = confirms.recv() => {
                    if !event.info.is_empty() {
                        tracing::info!(tx_hash = %event.tx.hash, info = %event.info, "Queued transaction confirmed");
                    }
                    self.confirm(&event.tx.tx).await;
                }
                Some(event) = errors.recv() => {
                    tracing::warn!(tx_hash = %event.tx.hash, error = %event.error, "Queued transaction failed");
                    self.error(&event.tx.tx).await;
                }
                else => break,
            }
        }
        confirms.unsubscribe();
        errors.unsubscribe();
        tracing::info!("Queue manager stopped");
    }

    /// Submit `tx` unless its key is already pending or finished.
    ///
    /// Returns the initial broadcast hash, or `None` when the send was a
    /// duplicate. If the manager rejects the transaction the key goes back to
    /// the status it had before.
    pub async fn send(
        &self,
        tx: Transaction,
        re_calc_gas: bool,
        info: impl Into<String>,
        price_limit: Option<u128>,
    ) -> Result<Option<TxHash>, TxError> {
        let key = (self.key_fn)(&tx);
        let mut statuses = self.statuses.write().await;

        let previous = statuses.get(&key).copied().unwrap_or_default();
        match previous {
            TxStatus::Pending => {
                tracing::info!(?key, "Transaction is pending in queue");
                metrics::record_queue_send("pending");
                return Ok(None);
            }
            TxStatus::Finished => {
                tracing::info!(?key, "Transaction is finished");
                metrics::record_queue_send("finished");
                return Ok(None);
            }
            TxStatus::Error => tracing::warn!(?key, "Transaction failed before, retrying"),
            TxStatus::NotFound => {}
        }

        statuses.insert(key.clone(), TxStatus::Pending);
        match self
            .tx_manager
            .async_send_tx(tx, re_calc_gas, info, price_limit)
            .await
        {
            Ok(hash) => {
                metrics::record_queue_send("submitted");
                Ok(Some(hash))
            }
            Err(e) => {
                match previous {
                    TxStatus::NotFound => statuses.remove(&key),
                    other => statuses.insert(key, other),
                };
                metrics::record_queue_send("rejected");
                Err(e)
            }
        }
    }

    /// Mark the key of `tx` as confirmed.
    pub async fn confirm(&self, tx: &Transaction) {
        let key = (self.key_fn)(tx);
        self.statuses.write().await.insert(key, TxStatus::Finished);
    }

    /// Mark the key of `tx` as failed; the next `send` retries it.
    pub async fn error(&self, tx: &Transaction) {
        let key = (self.key_fn)(tx);
        self.statuses.write().await.insert(key, TxStatus::Error);
    }

    pub async fn status(&self, key: &K) -> TxStatus {
        self.statuses
            .read()
            .await
            .get(key)
            .copied()
            .unwrap_or_default()
    }
}

impl<K: Debug> Debug for QueueManager<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("tx_manager", &self.tx_manager)
            .finish()
    }
}
