//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! transaction manager. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fee bump percentage matching the replace-by-fee premium mainstream EVM
/// nodes require before accepting a replacement.
pub const STANDARD_PRICE_BUMP: u64 = 10;

/// Fee bump percentage for low-fee networks that accept any strictly higher
/// price as a replacement.
pub const LOW_FEE_PRICE_BUMP: u64 = 1;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Chain RPC settings.
    pub chain: ChainConfig,

    /// Delivery and confirmation settings.
    pub txmanager: TxManagerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
        }
    }
}

/// Transaction delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TxManagerConfig {
    /// Hard deadline for one logical transaction, fee bumps included.
    pub period_secs: u64,

    /// How often the price is re-evaluated and the transaction rebroadcast.
    pub change_interval_secs: u64,

    /// How often receipts of the broadcast transactions are polled.
    pub listen_interval_secs: u64,

    /// Blocks that must be built on top of the receipt's block.
    pub confirm_height: u64,

    /// Minimum percentage a replacement raises the gas price by.
    pub price_bump_percent: u64,
}

impl TxManagerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn change_interval(&self) -> Duration {
        Duration::from_secs(self.change_interval_secs)
    }

    pub fn listen_interval(&self) -> Duration {
        Duration::from_secs(self.listen_interval_secs)
    }
}

impl Default for TxManagerConfig {
    fn default() -> Self {
        Self {
            period_secs: 30 * 60,
            change_interval_secs: 25,
            listen_interval_secs: 10,
            confirm_height: 3,
            price_bump_percent: STANDARD_PRICE_BUMP,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
