//! Fixed-point gas cost arithmetic.
//!
//! Costs are computed in [`Decimal`] and rounded half-up to 18 fractional
//! digits before any conversion to `f64`, so summing thousands of
//! transaction costs does not accumulate binary floating-point error.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValidationError;

/// Wei per ether.
pub const WEI_PER_ETH: u64 = 1_000_000_000_000_000_000;

/// Fractional digits kept in the intermediate ETH value.
pub const ETH_SCALE: u32 = 18;

/// Convert `gas_limit × gas_price_wei` to ETH.
///
/// # Examples
///
/// ```
/// use ledger_core::cost::gas_cost_eth;
/// use rust_decimal::Decimal;
///
/// // 10_000 gas at 10 gwei = 0.0001 ETH
/// assert_eq!(gas_cost_eth(10_000, 10_000_000_000), Decimal::new(1, 4));
/// ```
pub fn gas_cost_eth(gas_limit: u64, gas_price_wei: u64) -> Decimal {
    let limit = Decimal::from(gas_limit);
    let price = Decimal::from(gas_price_wei);
    let wei_per_eth = Decimal::from(WEI_PER_ETH);

    let eth = match limit.checked_mul(price) {
        Some(wei) => wei.checked_div(wei_per_eth),
        // Product exceeds the 96-bit mantissa; divide first.
        None => price
            .checked_div(wei_per_eth)
            .and_then(|p| p.checked_mul(limit)),
    }
    .unwrap_or(Decimal::MAX);

    eth.round_dp_with_strategy(ETH_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a gas price column into whole wei.
///
/// Accepts integer literals, decimal literals (`"20000000000.0"`) and
/// scientific notation (`"2.5e10"`). Fractional wei are truncated. The
/// result may be negative; range checks belong to the entity constructor.
pub fn parse_gas_price_wei(raw: &str) -> Result<i64, ValidationError> {
    const FIELD: &str = "Gas price";

    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::InvalidNumber {
            field: FIELD,
            value: raw.to_string(),
        });
    }

    if let Ok(v) = value.parse::<i64>() {
        return Ok(v);
    }

    let parsed = Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| ValidationError::InvalidNumber {
            field: FIELD,
            value: value.to_string(),
        })?;

    parsed
        .trunc()
        .to_i64()
        .ok_or_else(|| ValidationError::OutOfRange {
            field: FIELD,
            value: value.to_string(),
        })
}

/// Mean of a set of decimal costs, as `f64`. Empty input yields `0.0`.
pub fn mean_cost(costs: impl IntoIterator<Item = Decimal>) -> f64 {
    let mut count: u64 = 0;
    let mut total = Decimal::ZERO;
    let mut overflowed_f64: Option<f64> = None;

    for cost in costs {
        count += 1;
        match overflowed_f64.as_mut() {
            Some(acc) => *acc += cost.to_f64().unwrap_or(0.0),
            None => match total.checked_add(cost) {
                Some(t) => total = t,
                None => {
                    overflowed_f64 =
                        Some(total.to_f64().unwrap_or(0.0) + cost.to_f64().unwrap_or(0.0))
                }
            },
        }
    }

    if count == 0 {
        return 0.0;
    }

    match overflowed_f64 {
        Some(acc) => acc / count as f64,
        None => total
            .checked_div(Decimal::from(count))
            .and_then(|m| m.to_f64())
            .unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── gas_cost_eth ─────────────────────────────────────────────────────────

    #[test]
    fn test_cost_simple() {
        assert_eq!(gas_cost_eth(10_000, 10_000_000_000), Decimal::new(1, 4));
        let as_f64 = gas_cost_eth(10_000, 10_000_000_000).to_f64().unwrap();
        assert!((as_f64 - 0.0001).abs() < 1e-18);
    }

    #[test]
    fn test_cost_zero() {
        assert_eq!(gas_cost_eth(0, 50_000_000_000), Decimal::ZERO);
        assert_eq!(gas_cost_eth(21_000, 0), Decimal::ZERO);
    }

    #[test]
    fn test_cost_keeps_single_wei() {
        // 1 gas at 1 wei = 1e-18 ETH, representable at scale 18.
        assert_eq!(gas_cost_eth(1, 1), Decimal::new(1, 18));
    }

    #[test]
    fn test_cost_large_product_divides_first() {
        let cost = gas_cost_eth(u64::MAX, u64::MAX);
        assert!(cost > Decimal::from(1_000_000_000u64));
    }

    #[test]
    fn test_cost_sum_is_exact() {
        // 0.1 + 0.2 style drift does not appear in decimal arithmetic.
        let a = gas_cost_eth(1, 100_000_000_000_000_000);
        let b = gas_cost_eth(1, 200_000_000_000_000_000);
        assert_eq!(a + b, Decimal::new(3, 1));
    }

    // ── parse_gas_price_wei ──────────────────────────────────────────────────

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_gas_price_wei("20000000000"), Ok(20_000_000_000));
        assert_eq!(parse_gas_price_wei(" 7 "), Ok(7));
    }

    #[test]
    fn test_parse_decimal_truncates() {
        assert_eq!(parse_gas_price_wei("20000000000.0"), Ok(20_000_000_000));
        assert_eq!(parse_gas_price_wei("15.99"), Ok(15));
    }

    #[test]
    fn test_parse_scientific() {
        assert_eq!(parse_gas_price_wei("2.5e10"), Ok(25_000_000_000));
        assert_eq!(parse_gas_price_wei("1e3"), Ok(1_000));
    }

    #[test]
    fn test_parse_negative_passes_through() {
        assert_eq!(parse_gas_price_wei("-5"), Ok(-5));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_gas_price_wei("abc"),
            Err(ValidationError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_gas_price_wei("   "),
            Err(ValidationError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            parse_gas_price_wei("99999999999999999999999"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    // ── mean_cost ────────────────────────────────────────────────────────────

    #[test]
    fn test_mean_cost_empty() {
        assert_eq!(mean_cost(Vec::new()), 0.0);
    }

    #[test]
    fn test_mean_cost() {
        let costs = vec![Decimal::new(1, 1), Decimal::new(2, 1), Decimal::new(3, 1)];
        assert!((mean_cost(costs) - 0.2).abs() < 1e-15);
    }
}
