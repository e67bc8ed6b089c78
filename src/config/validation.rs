//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, bump percentage sane)
//! - Check interval ordering (ticks must fit inside the deadline)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{Config, TxManagerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.rpc_url.trim().is_empty() {
        errors.push(ValidationError::new("chain.rpc_url", "must not be empty"));
    }
    if config.chain.chain_id == 0 {
        errors.push(ValidationError::new("chain.chain_id", "must be non-zero"));
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be > 0"));
    }

    check_txmanager(&config.txmanager, &mut errors);

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the delivery settings alone.
///
/// `TxManager::new` runs this, so hand-built configs get the same checks as
/// loaded ones.
pub fn validate_txmanager_config(config: &TxManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_txmanager(config, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_txmanager(tx: &TxManagerConfig, errors: &mut Vec<ValidationError>) {
    if tx.period_secs == 0 {
        errors.push(ValidationError::new("txmanager.period_secs", "must be > 0"));
    }
    if tx.change_interval_secs == 0 {
        errors.push(ValidationError::new("txmanager.change_interval_secs", "must be > 0"));
    } else if tx.change_interval_secs >= tx.period_secs {
        errors.push(ValidationError::new(
            "txmanager.change_interval_secs",
            format!("must be shorter than period_secs ({})", tx.period_secs),
        ));
    }
    if tx.listen_interval_secs == 0 {
        errors.push(ValidationError::new("txmanager.listen_interval_secs", "must be > 0"));
    } else if tx.listen_interval_secs >= tx.period_secs {
        errors.push(ValidationError::new(
            "txmanager.listen_interval_secs",
            format!("must be shorter than period_secs ({})", tx.period_secs),
        ));
    }
    if tx.price_bump_percent == 0 || tx.price_bump_percent > 100 {
        errors.push(ValidationError::new(
            "txmanager.price_bump_percent",
            "must be between 1 and 100",
        ));
    }
}
