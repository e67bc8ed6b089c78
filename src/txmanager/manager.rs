//! Transaction delivery: nonce allocation, broadcast, fee bumps and
//! confirmation for a stream of independent transactions from one signer.
//!
//! # Flow
//! ```text
//! send_tx
//!     → next nonce (cached, serialized)
//!     → sign + broadcast              (failure returned to the caller)
//!     → wait_and_change               (caller's task or a spawned one)
//!         ├─ every change_interval: reprice, re-sign, rebroadcast
//!         ├─ listener: receipts of the last two variants
//!         └─ deadline: give up
//!     → TxConfirmEvent | TxErrorEvent on the feeds
//! ```

use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::blockchain::{ChainClient, SignedTx, Transaction, TransactionSigner};
use crate::config::validation::validate_txmanager_config;
use crate::config::{ConfigError, TxManagerConfig};
use crate::observability::metrics;
use crate::txmanager::error::TxError;
use crate::txmanager::feed::{Feed, Subscription, DEFAULT_FEED_CAPACITY};
use crate::txmanager::listener::ConfirmationListener;
use crate::txmanager::nonce::NonceCache;
use crate::txmanager::pricing::next_gas_price;
use crate::txmanager::types::{Delivery, TxConfirmEvent, TxErrorEvent, TxWithContext};

/// Delivers transactions for one signer. Safe for concurrent use; share it
/// behind an `Arc`.
pub struct TxManager {
    config: TxManagerConfig,
    client: Arc<dyn ChainClient>,
    signer: Arc<dyn TransactionSigner>,
    nonce: NonceCache,
    confirm_feed: Feed<TxConfirmEvent>,
    error_feed: Feed<TxErrorEvent>,
}

impl TxManager {
    /// Rejects configs the supervisory loop cannot run with, such as zero
    /// intervals.
    pub fn new(
        config: TxManagerConfig,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Arc<Self>, ConfigError> {
        validate_txmanager_config(&config).map_err(ConfigError::Validation)?;
        Ok(Arc::new(Self {
            config,
            client,
            signer,
            nonce: NonceCache::new(),
            confirm_feed: Feed::new(DEFAULT_FEED_CAPACITY),
            error_feed: Feed::new(DEFAULT_FEED_CAPACITY),
        }))
    }

    /// Events for transactions that reached the confirmation depth.
    ///
    /// Subscribe before sending; events published earlier are not replayed.
    pub fn subscribe_confirm_events(&self) -> Subscription<TxConfirmEvent> {
        self.confirm_feed.subscribe()
    }

    /// Events for transactions that were given up on.
    pub fn subscribe_error_events(&self) -> Subscription<TxErrorEvent> {
        self.error_feed.subscribe()
    }

    /// Address transactions are sent from.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn config(&self) -> &TxManagerConfig {
        &self.config
    }

    pub async fn estimate_gas(&self, tx: &Transaction) -> Result<u64, TxError> {
        self.client.estimate_gas(tx).await.map_err(TxError::EstimateGas)
    }

    /// Send `tx` and wait in the caller's task until it is confirmed or
    /// given up on.
    ///
    /// `Err` only when the initial broadcast fails. The terminal outcome is
    /// returned and also published on the event feeds.
    pub async fn sync_send_tx(
        &self,
        tx: Transaction,
        re_calc_gas: bool,
        info: impl Into<String>,
        price_limit: Option<u128>,
    ) -> Result<Delivery, TxError> {
        let (txp, deadline) = self.submit(tx, re_calc_gas, info.into(), price_limit).await?;
        Ok(self.wait_and_change(txp, deadline).await)
    }

    /// Send `tx` and return the hash of the initial broadcast; confirmation,
    /// fee bumps and the final event happen in a background task.
    pub async fn async_send_tx(
        self: &Arc<Self>,
        tx: Transaction,
        re_calc_gas: bool,
        info: impl Into<String>,
        price_limit: Option<u128>,
    ) -> Result<TxHash, TxError> {
        let (txp, deadline) = self.submit(tx, re_calc_gas, info.into(), price_limit).await?;
        let hash = txp.signed.hash;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.wait_and_change(txp, deadline).await;
        });
        Ok(hash)
    }

    /// Sign `tx` with the next nonce. A signing failure leaves the nonce
    /// unused for the next send.
    async fn sign_with_next_nonce(&self, tx: Transaction) -> Result<SignedTx, TxError> {
        let address = self.signer.address();
        let signer = &self.signer;
        self.nonce
            .next_with(
                || async { self.client.get_nonce(address).await.map_err(TxError::Nonce) },
                move |nonce| async move {
                    let mut tx = tx;
                    tx.nonce = nonce;
                    signer.sign_tx(&tx).await.map_err(TxError::Sign)
                },
            )
            .await
    }

    /// Drop the cached nonce so the next send fetches it from the chain.
    pub async fn reset_nonce(&self) {
        self.nonce.reset().await;
        metrics::record_nonce_reset();
    }

    /// Fill missing gas fields, allocate the nonce, sign and broadcast.
    async fn submit(
        &self,
        mut tx: Transaction,
        re_calc_gas: bool,
        info: String,
        price_limit: Option<u128>,
    ) -> Result<(TxWithContext, Instant), TxError> {
        tx.from = self.signer.address();
        // Before the nonce is taken, so a failure here leaves no gap
        if tx.gas_price == 0 {
            tx.gas_price = self.client.gas_price().await.map_err(TxError::GasPrice)?;
        }
        if tx.gas_limit == 0 {
            tx.gas_limit = self.estimate_gas(&tx).await?;
        }

        let signed = self.sign_with_next_nonce(tx).await?;
        let deadline = Instant::now() + self.config.period();

        if let Err(e) = self.client.send_raw_transaction(&signed.raw).await {
            metrics::record_broadcast("initial", false);
            tracing::warn!(
                tx_hash = %signed.hash,
                nonce = signed.tx.nonce,
                error = %e,
                "Initial broadcast rejected"
            );
            if e.is_nonce_too_low() {
                self.reset_nonce().await;
            }
            return Err(TxError::Broadcast(e));
        }
        metrics::record_broadcast("initial", true);

        tracing::info!(
            tx_hash = %signed.hash,
            nonce = signed.tx.nonce,
            gas_price = signed.tx.gas_price,
            info = %info,
            "Transaction broadcast"
        );

        let txp = TxWithContext {
            signed,
            price_limit: price_limit.unwrap_or(0),
            re_calc_gas,
            info,
        };
        Ok((txp, deadline))
    }

    /// Build a repriced replacement of the current variant.
    ///
    /// `Ok(None)` when the market price gives no reason to replace it. The
    /// nonce is kept; `txp` itself is left untouched.
    pub async fn reconstruct(&self, txp: &TxWithContext) -> Result<Option<SignedTx>, TxError> {
        let market = self.client.gas_price().await.map_err(TxError::GasPrice)?;
        let current = txp.signed.tx.gas_price;

        let Some(gas_price) = next_gas_price(
            current,
            market,
            self.config.price_bump_percent,
            txp.price_limit(),
        )?
        else {
            tracing::debug!(tx_hash = %txp.signed.hash, current, market, "Price still competitive");
            return Ok(None);
        };

        let mut tx = txp.signed.tx.clone();
        if txp.re_calc_gas {
            tx.gas_limit = self.estimate_gas(&tx).await?;
        }
        tx.gas_price = gas_price;

        let signed = self.signer.sign_tx(&tx).await.map_err(TxError::Sign)?;
        Ok(Some(signed))
    }

    /// Supervise one broadcast transaction until confirmation or `deadline`.
    async fn wait_and_change(&self, mut txp: TxWithContext, deadline: Instant) -> Delivery {
        let change_interval = self.config.change_interval();
        let mut ticker = interval_at(Instant::now() + change_interval, change_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expired = sleep_until(deadline);
        tokio::pin!(expired);

        let (variants, variants_rx) = mpsc::unbounded_channel();
        let listener = ConfirmationListener::new(
            Arc::clone(&self.client),
            self.config.confirm_height,
            self.config.listen_interval(),
        );
        let mut listening = AbortOnDrop(tokio::spawn(listener.run(variants_rx, deadline)));
        let mut listener_done = false;
        let _ = variants.send(txp.signed.clone());

        let delivery = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.reconstruct(&txp).await {
                        Ok(None) => {}
                        Ok(Some(replacement)) => {
                            if self.rebroadcast(&replacement).await {
                                txp.signed = replacement;
                                let _ = variants.send(txp.signed.clone());
                            }
                        }
                        Err(e) if e.is_terminal() => break self.fail(&txp, e),
                        Err(e) => {
                            tracing::warn!(tx_hash = %txp.signed.hash, error = %e, "Reconstruct failed, retrying next tick");
                        }
                    }
                }
                joined = &mut listening.0, if !listener_done => {
                    listener_done = true;
                    match joined {
                        Ok(Some(mined)) => break self.confirm(mined, &txp.info),
                        // Deadline reached; the expiry branch reports it
                        Ok(None) => {}
                        Err(e) => tracing::error!(error = %e, "Confirmation listener stopped"),
                    }
                }
                _ = &mut expired => {
                    break self.fail(&txp, TxError::Timeout(self.config.period()));
                }
            }
        };

        drop(listening);
        delivery
    }

    async fn rebroadcast(&self, replacement: &SignedTx) -> bool {
        match self.client.send_raw_transaction(&replacement.raw).await {
            Ok(_) => {
                metrics::record_broadcast("rebroadcast", true);
                metrics::record_gas_bump(replacement.tx.gas_price);
                tracing::info!(
                    tx_hash = %replacement.hash,
                    nonce = replacement.tx.nonce,
                    gas_price = replacement.tx.gas_price,
                    gas_limit = replacement.tx.gas_limit,
                    "Transaction rebroadcast"
                );
                true
            }
            Err(e) => {
                metrics::record_broadcast("rebroadcast", false);
                tracing::warn!(
                    tx_hash = %replacement.hash,
                    error = %e,
                    "Rebroadcast failed, retrying next tick"
                );
                false
            }
        }
    }

    fn confirm(&self, mined: SignedTx, info: &str) -> Delivery {
        tracing::info!(tx_hash = %mined.hash, nonce = mined.tx.nonce, info = %info, "Transaction confirmed");
        metrics::record_outcome("confirmed");

        let event = TxConfirmEvent {
            tx: mined,
            info: info.to_string(),
        };
        self.confirm_feed.send(event.clone());
        Delivery::Confirmed(event)
    }

    fn fail(&self, txp: &TxWithContext, error: TxError) -> Delivery {
        tracing::error!(tx_hash = %txp.signed.hash, nonce = txp.signed.tx.nonce, error = %error, "Transaction failed");
        metrics::record_outcome(error.kind());

        let event = TxErrorEvent {
            tx: txp.signed.clone(),
            error,
        };
        self.error_feed.send(event.clone());
        Delivery::Failed(event)
    }
}

/// Aborts the task when dropped, including when the owning future is
/// cancelled mid-await.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl std::fmt::Debug for TxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxManager")
            .field("address", &self.signer.address())
            .field("config", &self.config)
            .finish()
    }
}
