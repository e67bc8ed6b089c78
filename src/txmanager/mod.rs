//! Transaction delivery and confirmation subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → QueueManager::send (dedup by key: NotFound/Error → Pending)
//!     → TxManager::async_send_tx (nonce, sign, broadcast)
//!     → wait_and_change loop (fee bumps + confirmation listener + deadline)
//!     → confirm / error feeds
//!     → QueueManager background loop (Pending → Finished | Error)
//! ```
//!
//! # Design Decisions
//! - One nonce stream per signer, allocated under a lock
//! - Replacements keep the nonce and only change gas price and gas limit
//! - Late failures are only visible on the event feeds
//! - The only cancellation is the per-transaction deadline

pub mod error;
pub mod feed;
pub mod listener;
pub mod manager;
pub mod nonce;
pub mod pricing;
pub mod queue;
pub mod types;

pub use error::TxError;
pub use feed::{Feed, Subscription};
pub use manager::TxManager;
pub use queue::QueueManager;
pub use types::{Delivery, DeliveryReport, TxConfirmEvent, TxErrorEvent, TxStatus, TxWithContext};
