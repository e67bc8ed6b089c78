//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every ShutdownSignal resolves → background loops exit
//! ```
//!
//! # Design Decisions
//! - Shutdown only stops bookkeeping loops; in-flight deliveries keep running
//!   until confirmed or past their deadline

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
