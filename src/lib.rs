//! Reliable transaction delivery for EVM chains.
//!
//! `TxManager` signs, broadcasts, fee-bumps and watches transactions until
//! they are buried deep enough or their deadline passes; `QueueManager`
//! deduplicates submissions per application key on top of it.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod txmanager;

pub use config::schema::Config;
pub use lifecycle::Shutdown;
pub use txmanager::{QueueManager, TxManager};
