//! Blockchain RPC client with timeout and failover handling.
//!
//! # Responsibilities
//! - Define the `ChainClient` capabilities the transaction manager consumes
//! - Connect to one primary and any number of failover JSON-RPC endpoints
//! - Bound every call with the configured RPC timeout
//! - Classify node rejections (nonce too low, underpriced, ...)

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{
    ChainConfig, ChainError, ChainId, ChainResult, Receipt, Transaction,
};

/// Chain capabilities required by the transaction manager.
///
/// Implementations must be safe for concurrent use; the manager shares one
/// instance between every in-flight transaction.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next account nonce for `address` at the latest block.
    async fn get_nonce(&self, address: Address) -> ChainResult<u64>;

    /// Current gas price estimate in wei.
    async fn gas_price(&self) -> ChainResult<u128>;

    /// Gas needed to execute `tx`.
    async fn estimate_gas(&self, tx: &Transaction) -> ChainResult<u64>;

    /// Broadcast an EIP-2718 encoded signed transaction.
    async fn send_raw_transaction(&self, raw: &Bytes) -> ChainResult<TxHash>;

    /// Receipt for `hash`, `None` while the transaction is not mined.
    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<Receipt>>;

    /// Current chain head height.
    async fn block_number(&self) -> ChainResult<u64>;
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Alloy-backed chain client with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Configuration.
    config: ChainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// Only the primary URL must parse; invalid failover URLs are skipped.
    pub async fn new(config: ChainConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> ChainResult<ChainId> {
        self.call("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Run `op` against each provider in order until one answers.
    ///
    /// A JSON-RPC error response means the node processed the request and
    /// said no, so it is returned as is instead of being retried elsewhere.
    async fn call<T, F, Fut>(&self, what: &str, op: F) -> ChainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut all_timed_out = true;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(RpcError::ErrorResp(payload))) => {
                    return Err(ChainError::from_rpc_message(payload.message.to_string()));
                }
                Ok(Err(e)) => {
                    all_timed_out = false;
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        if all_timed_out {
            return Err(ChainError::Timeout(self.config.rpc_timeout_secs));
        }
        Err(ChainError::Rpc(format!("All RPC providers failed to {}", what)))
    }
}

#[async_trait]
impl ChainClient for BlockchainClient {
    async fn get_nonce(&self, address: Address) -> ChainResult<u64> {
        self.call("get transaction count", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        self.call("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn estimate_gas(&self, tx: &Transaction) -> ChainResult<u64> {
        let request = tx.to_call_request();
        self.call("estimate gas", |p| {
            let request = request.clone();
            async move { p.estimate_gas(request).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> ChainResult<TxHash> {
        self.call("send raw transaction", |p| async move {
            p.send_raw_transaction(raw).await.map(|pending| *pending.tx_hash())
        })
        .await
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<Receipt>> {
        let receipt = self
            .call("get receipt", |p| async move {
                p.get_transaction_receipt(hash).await
            })
            .await?;

        // A receipt without a block number belongs to a pending block.
        Ok(receipt.and_then(|r| {
            r.block_number.map(|block_number| Receipt {
                tx_hash: r.transaction_hash,
                block_number,
                status: r.status(),
            })
        }))
    }

    async fn block_number(&self) -> ChainResult<u64> {
        self.call("get block number", |p| async move { p.get_block_number().await })
            .await
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
