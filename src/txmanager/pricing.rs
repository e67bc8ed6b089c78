//! Gas price escalation rules.

use crate::txmanager::error::TxError;

/// `ceil(current * (100 + bump_percent) / 100)`, saturating.
pub fn bump_price(current: u128, bump_percent: u64) -> u128 {
    let factor = 100u128 + u128::from(bump_percent);
    current.saturating_mul(factor).saturating_add(99) / 100
}

/// Decide the replacement price for one escalation tick.
///
/// `Ok(None)` when the market price is not above the current price, since a
/// rebroadcast at an equal or lower price cannot help. Otherwise the larger
/// of the market price and the bumped price, unless that exceeds `limit`.
pub fn next_gas_price(
    current: u128,
    market: u128,
    bump_percent: u64,
    limit: Option<u128>,
) -> Result<Option<u128>, TxError> {
    if market <= current {
        return Ok(None);
    }

    let price = market.max(bump_price(current, bump_percent));
    match limit {
        Some(limit) if price > limit => Err(TxError::OverPriceLimit { limit, price }),
        _ => Ok(Some(price)),
    }
}
