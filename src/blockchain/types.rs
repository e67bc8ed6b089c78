//! Chain-facing types and error definitions.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export ChainConfig from config module to avoid duplication
pub use crate::config::schema::ChainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors reported by the chain client or the signer.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node rejected the transaction because its nonce is already used.
    #[error("nonce too low: {0}")]
    NonceTooLow(String),

    /// A replacement was rejected because its price premium is too small.
    #[error("replacement transaction underpriced: {0}")]
    Underpriced(String),

    /// The sender cannot pay for gas * price + value.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl ChainError {
    /// Classify a raw error message returned by a node.
    ///
    /// Nodes only report these conditions as free text, so the match is on
    /// the lowercase message.
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("nonce too low") {
            ChainError::NonceTooLow(message)
        } else if lower.contains("underpriced") {
            ChainError::Underpriced(message)
        } else if lower.contains("insufficient funds") {
            ChainError::InsufficientFunds(message)
        } else {
            ChainError::Rpc(message)
        }
    }

    /// Whether the local nonce cache has fallen behind the chain.
    pub fn is_nonce_too_low(&self) -> bool {
        matches!(self, ChainError::NonceTooLow(_))
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// An unsigned transaction as handed to the manager by callers.
///
/// The manager only ever changes `gas_price`, `gas_limit` and `nonce`, and
/// always on its own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub input: Bytes,
    /// Legacy gas price in wei.
    pub gas_price: u128,
    pub gas_limit: u64,
    pub value: U256,
    pub nonce: u64,
    pub chain_id: u64,
}

impl Transaction {
    /// Build a complete legacy transaction request.
    pub fn to_request(&self) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(self.from)
            .with_input(self.input.clone())
            .with_value(self.value)
            .with_nonce(self.nonce)
            .with_gas_price(self.gas_price)
            .with_gas_limit(self.gas_limit)
            .with_chain_id(self.chain_id);
        request.to = Some(self.to.map_or(TxKind::Create, TxKind::Call));
        request
    }

    /// Build the call used for gas estimation; the current gas limit is left
    /// out so it does not cap the estimate.
    ///
    /// The chain id is left to the node: callers' transactions carry 0 until
    /// the signer fills it in, and nodes reject a mismatched id.
    pub fn to_call_request(&self) -> TransactionRequest {
        let mut request = self.to_request();
        request.gas = None;
        request.nonce = None;
        request.chain_id = None;
        request
    }
}

/// A transaction together with its signed wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx: Transaction,
    pub hash: TxHash,
    /// EIP-2718 encoded bytes, ready for `eth_sendRawTransaction`.
    pub raw: Bytes,
}

/// The parts of a transaction receipt the confirmation logic looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// `true` when execution succeeded.
    pub status: bool,
}
