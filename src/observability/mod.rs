//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! TxManager / QueueManager produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Transaction hash and nonce are log fields, never interpolated
//! - Metrics are cheap and no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
