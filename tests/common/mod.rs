//! Shared fakes for the integration tests.
//!
//! `MockChain` is an in-memory node: it hands out the account nonce, quotes a
//! settable gas price, records every broadcast and serves receipts for the
//! transactions a test mines. `FakeSigner` "signs" by serializing the
//! transaction, so the mock can decode exactly what was broadcast.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address, Bytes, TxHash};
use async_trait::async_trait;

use txmanager::blockchain::{
    ChainClient, ChainError, ChainResult, Receipt, SignedTx, Transaction, TransactionSigner,
};
use txmanager::config::TxManagerConfig;
use txmanager::TxManager;

pub const SENDER: Address = Address::repeat_byte(0xaa);
pub const RECIPIENT: Address = Address::repeat_byte(0xbb);
pub const CHAIN_ID: u64 = 31337;

#[derive(Debug, Default)]
pub struct ChainState {
    pub chain_nonce: u64,
    pub gas_price: u128,
    pub head: u64,
    pub gas_estimate: u64,
    /// Broadcast transactions in arrival order.
    pub sent: Vec<SignedTx>,
    pub receipts: HashMap<TxHash, Receipt>,
    /// Error returned by the next `send_raw_transaction`.
    pub reject_next_send: Option<ChainError>,
    /// Number of upcoming `estimate_gas` calls that fail.
    pub failing_estimates: u32,
    /// Mine every accepted broadcast at the current head.
    pub mine_on_send: bool,
    pub nonce_fetches: u32,
    pub estimate_calls: u32,
    pub receipt_queries: u32,
}

#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(gas_price: u128) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                gas_price,
                gas_estimate: 21_000,
                ..Default::default()
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_gas_price(&self, price: u128) {
        self.state().gas_price = price;
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    pub fn set_chain_nonce(&self, nonce: u64) {
        self.state().chain_nonce = nonce;
    }

    pub fn reject_next_send(&self, error: ChainError) {
        self.state().reject_next_send = Some(error);
    }

    pub fn mine(&self, hash: TxHash, block_number: u64, status: bool) {
        self.state().receipts.insert(
            hash,
            Receipt {
                tx_hash: hash,
                block_number,
                status,
            },
        );
    }

    pub fn sent(&self) -> Vec<SignedTx> {
        self.state().sent.clone()
    }

    pub fn sent_prices(&self) -> Vec<u128> {
        self.state().sent.iter().map(|s| s.tx.gas_price).collect()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_nonce(&self, _address: Address) -> ChainResult<u64> {
        let mut state = self.state();
        state.nonce_fetches += 1;
        Ok(state.chain_nonce)
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        Ok(self.state().gas_price)
    }

    async fn estimate_gas(&self, _tx: &Transaction) -> ChainResult<u64> {
        let mut state = self.state();
        state.estimate_calls += 1;
        if state.failing_estimates > 0 {
            state.failing_estimates -= 1;
            return Err(ChainError::Rpc("execution reverted".into()));
        }
        Ok(state.gas_estimate)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> ChainResult<TxHash> {
        let tx: Transaction =
            serde_json::from_slice(raw).map_err(|e| ChainError::Rpc(e.to_string()))?;
        let hash = keccak256(raw);

        let mut state = self.state();
        if let Some(error) = state.reject_next_send.take() {
            return Err(error);
        }
        state.sent.push(SignedTx {
            tx,
            hash,
            raw: raw.clone(),
        });
        if state.mine_on_send {
            let head = state.head;
            state.receipts.insert(
                hash,
                Receipt {
                    tx_hash: hash,
                    block_number: head,
                    status: true,
                },
            );
        }
        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<Receipt>> {
        let mut state = self.state();
        state.receipt_queries += 1;
        Ok(state.receipts.get(&hash).copied())
    }

    async fn block_number(&self) -> ChainResult<u64> {
        Ok(self.state().head)
    }
}

/// Signs by serializing the transaction; the hash is keccak256 of the bytes.
#[derive(Debug, Default)]
pub struct FakeSigner {
    fail_next: AtomicBool,
}

impl FakeSigner {
    /// Make the next `sign_tx` call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionSigner for FakeSigner {
    fn address(&self) -> Address {
        SENDER
    }

    async fn sign_tx(&self, tx: &Transaction) -> ChainResult<SignedTx> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ChainError::Wallet("signer unavailable".into()));
        }
        let mut tx = tx.clone();
        tx.from = SENDER;
        tx.chain_id = CHAIN_ID;
        let raw = Bytes::from(serde_json::to_vec(&tx).map_err(|e| ChainError::Wallet(e.to_string()))?);
        Ok(SignedTx {
            hash: keccak256(&raw),
            tx,
            raw,
        })
    }
}

/// Short timings so paused-clock tests stay readable.
pub fn fast_config() -> TxManagerConfig {
    TxManagerConfig {
        period_secs: 300,
        change_interval_secs: 30,
        listen_interval_secs: 10,
        confirm_height: 0,
        price_bump_percent: 10,
    }
}

pub fn manager(chain: &Arc<MockChain>, config: TxManagerConfig) -> Arc<TxManager> {
    manager_with_signer(chain, config, Arc::new(FakeSigner::default()))
}

pub fn manager_with_signer(
    chain: &Arc<MockChain>,
    config: TxManagerConfig,
    signer: Arc<FakeSigner>,
) -> Arc<TxManager> {
    TxManager::new(config, chain.clone(), signer).unwrap()
}

/// Plain transfer with gas fields left for the manager to fill.
pub fn transfer(value: u64) -> Transaction {
    Transaction {
        to: Some(RECIPIENT),
        value: alloy::primitives::U256::from(value),
        ..Default::default()
    }
}
