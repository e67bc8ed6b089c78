//! Values flowing through the delivery engine.

use serde::Serialize;

use crate::blockchain::SignedTx;
use crate::txmanager::error::TxError;

/// A broadcast transaction plus the caller's delivery options.
///
/// Owned by exactly one supervisory loop once broadcast.
#[derive(Debug, Clone)]
pub struct TxWithContext {
    pub signed: SignedTx,
    /// Ceiling for the gas price during escalation, 0 means unlimited.
    pub price_limit: u128,
    /// Re-estimate the gas limit on every escalation.
    pub re_calc_gas: bool,
    /// Caller label surfaced on confirmation.
    pub info: String,
}

impl TxWithContext {
    /// The configured ceiling, if any.
    pub fn price_limit(&self) -> Option<u128> {
        (self.price_limit != 0).then_some(self.price_limit)
    }
}

/// Published once a logical transaction reached the confirmation depth.
#[derive(Debug, Clone)]
pub struct TxConfirmEvent {
    /// The broadcast variant that got mined.
    pub tx: SignedTx,
    pub info: String,
}

/// Published once a logical transaction was given up on.
#[derive(Debug, Clone)]
pub struct TxErrorEvent {
    /// The last broadcast variant.
    pub tx: SignedTx,
    pub error: TxError,
}

/// Terminal result of one supervisory loop.
#[derive(Debug, Clone)]
pub enum Delivery {
    Confirmed(TxConfirmEvent),
    Failed(TxErrorEvent),
}

impl Delivery {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Delivery::Confirmed(_))
    }

    /// Printable summary for logs and the CLI.
    pub fn report(&self) -> DeliveryReport {
        match self {
            Delivery::Confirmed(e) => DeliveryReport {
                status: "confirmed",
                tx_hash: e.tx.hash.to_string(),
                nonce: e.tx.tx.nonce,
                gas_price: e.tx.tx.gas_price.to_string(),
                info: e.info.clone(),
                error: None,
            },
            Delivery::Failed(e) => DeliveryReport {
                status: "failed",
                tx_hash: e.tx.hash.to_string(),
                nonce: e.tx.tx.nonce,
                gas_price: e.tx.tx.gas_price.to_string(),
                info: String::new(),
                error: Some(e.error.to_string()),
            },
        }
    }
}

/// Serializable view of a [`Delivery`].
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub status: &'static str,
    pub tx_hash: String,
    pub nonce: u64,
    /// Decimal wei; kept as a string so JSON consumers do not lose precision.
    pub gas_price: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Queue status of one deduplication key.
///
/// `NotFound` is never stored; it is what an absent key reads as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TxStatus {
    #[default]
    NotFound,
    Pending,
    Finished,
    /// Failed; `send` for the key again retries it.
    Error,
}
