//! Wallet management and transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::blockchain::types::{ChainError, ChainResult, SignedTx, Transaction};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "TXMANAGER_PRIVATE_KEY";

/// Key holder able to sign transactions for one address.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Address every signed transaction is sent from.
    fn address(&self) -> Address;

    /// Sign `tx` exactly as given (nonce, gas price and gas limit included).
    async fn sign_tx(&self, tx: &Transaction) -> ChainResult<SignedTx>;
}

/// Local private-key wallet producing legacy EIP-155 transactions.
#[derive(Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Network wallet used to turn requests into signed envelopes.
    wallet: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// Accepts the key with or without a `0x` prefix. The key is never logged.
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> ChainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self {
            wallet: EthereumWallet::from(signer.clone()),
            signer,
            chain_id,
        })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `TXMANAGER_PRIVATE_KEY` from environment.
    pub fn from_env(chain_id: u64) -> ChainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            ChainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl TransactionSigner for Wallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_tx(&self, tx: &Transaction) -> ChainResult<SignedTx> {
        let mut tx = tx.clone();
        tx.from = self.signer.address();
        tx.chain_id = self.chain_id;

        let envelope = tx
            .to_request()
            .build(&self.wallet)
            .await
            .map_err(|e| ChainError::Wallet(format!("Signing failed: {}", e)))?;

        Ok(SignedTx {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
            tx,
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
