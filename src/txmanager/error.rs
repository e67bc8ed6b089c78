//! Transaction delivery errors.

use std::time::Duration;

use thiserror::Error;

use crate::blockchain::ChainError;

/// Failures of a logical transaction.
///
/// Errors found while submitting are returned to the caller. Errors found
/// later by the supervisory loop travel inside `TxErrorEvent`s, which is why
/// the type is `Clone`.
#[derive(Debug, Clone, Error)]
pub enum TxError {
    #[error("get nonce: {0}")]
    Nonce(#[source] ChainError),

    #[error("sign transaction: {0}")]
    Sign(#[source] ChainError),

    #[error("sendRawTransaction: {0}")]
    Broadcast(#[source] ChainError),

    #[error("get gas price: {0}")]
    GasPrice(#[source] ChainError),

    #[error("estimate gas: {0}")]
    EstimateGas(#[source] ChainError),

    /// Escalation would push the price past the caller's ceiling.
    #[error("over price limit: limit {limit}, got {price}")]
    OverPriceLimit { limit: u128, price: u128 },

    /// The transaction was not confirmed within its period.
    #[error("timeout: not confirmed within {0:?}")]
    Timeout(Duration),
}

impl TxError {
    /// Whether the supervisory loop gives up on this error instead of
    /// retrying on the next tick.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxError::OverPriceLimit { .. } | TxError::Timeout(_))
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TxError::Nonce(_) => "nonce",
            TxError::Sign(_) => "sign",
            TxError::Broadcast(_) => "broadcast",
            TxError::GasPrice(_) => "gas_price",
            TxError::EstimateGas(_) => "estimate_gas",
            TxError::OverPriceLimit { .. } => "price_limit",
            TxError::Timeout(_) => "timeout",
        }
    }
}
