//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + [chain] config
//!     → wallet.rs (key loading, transaction signing)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → txmanager (nonce, broadcast, fee bumps, confirmation)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod types;
pub mod wallet;

pub use client::{BlockchainClient, ChainClient};
pub use types::{ChainConfig, ChainError, ChainId, ChainResult, Receipt, SignedTx, Transaction};
pub use wallet::{TransactionSigner, Wallet};
