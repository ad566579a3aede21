use rust_decimal::Decimal;
use thiserror::Error;

/// Why an order could not be sized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingRejection {
    #[error("no trading balance available")]
    NoBalance,

    #[error("entry price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("risk percentage must be in (0, 1], got {0}")]
    InvalidRisk(String),

    #[error("order notional {notional} below minimum {minimum}")]
    BelowMinimum { notional: Decimal, minimum: Decimal },

    #[error("order size out of range at price {0}")]
    OutOfRange(Decimal),
}

/// Inputs that do not change per user.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingParams {
    /// Fraction of available balance committed per order (0.0-1.0)
    pub risk_pct: f64,
    /// Requested leverage multiplier
    pub leverage: u32,
    /// Hard ceiling on leverage
    pub max_leverage: u32,
    /// Smallest notional the venue accepts
    pub min_notional: Decimal,
}

/// Calculate order quantity from available balance
///
/// # Arguments
/// * `available` - Withdrawable plus non-withdrawable balance in quote currency
/// * `price` - Entry price for the asset
/// * `params` - Risk percentage, leverage and venue minimum
///
/// # Returns
/// Base-asset quantity, rounded down to 8 decimal places
///
/// # Errors
/// Returns a rejection if balance, price or resulting notional are unusable
pub fn calculate_order_quantity(
    available: Decimal,
    price: Decimal,
    params: &SizingParams,
) -> Result<Decimal, SizingRejection> {
    if available <= Decimal::ZERO {
        return Err(SizingRejection::NoBalance);
    }

    if price <= Decimal::ZERO {
        return Err(SizingRejection::InvalidPrice(price));
    }

    if !(params.risk_pct > 0.0 && params.risk_pct <= 1.0) {
        return Err(SizingRejection::InvalidRisk(params.risk_pct.to_string()));
    }
    let risk_pct = Decimal::try_from(params.risk_pct)
        .map_err(|e| SizingRejection::InvalidRisk(e.to_string()))?;

    // Leverage is capped, and never below 1x
    let leverage = Decimal::from(effective_leverage(params.leverage, params.max_leverage));

    // Notional = available × risk_pct × leverage
    let notional = available
        .checked_mul(risk_pct)
        .and_then(|n| n.checked_mul(leverage))
        .ok_or(SizingRejection::OutOfRange(price))?;
    if notional < params.min_notional || notional <= Decimal::ZERO {
        return Err(SizingRejection::BelowMinimum {
            notional,
            minimum: params.min_notional,
        });
    }

    let quantity = notional
        .checked_div(price)
        .ok_or(SizingRejection::OutOfRange(price))?
        .trunc_with_scale(8);
    if quantity <= Decimal::ZERO {
        return Err(SizingRejection::BelowMinimum {
            notional,
            minimum: params.min_notional,
        });
    }

    Ok(quantity)
}

/// Requested leverage bounded by `[1, max_leverage]`.
#[must_use]
pub fn effective_leverage(leverage: u32, max_leverage: u32) -> u32 {
    leverage.min(max_leverage).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params(risk_pct: f64, leverage: u32, max_leverage: u32) -> SizingParams {
        SizingParams {
            risk_pct,
            leverage,
            max_leverage,
            min_notional: dec!(10),
        }
    }

    #[test]
    fn test_extreme_inputs_rejected_without_panicking() {
        // $100k / 1e-28 does not fit in a Decimal
        let tiny = Decimal::new(1, 28);
        assert_eq!(
            calculate_order_quantity(dec!(100000), tiny, &params(1.0, 1, 3)),
            Err(SizingRejection::OutOfRange(tiny))
        );
        assert!(matches!(
            calculate_order_quantity(Decimal::MAX, dec!(100), &params(1.0, 3, 3)),
            Err(SizingRejection::OutOfRange(_))
        ));
    }

    #[test]
    fn test_basic_order_sizing() {
        // $10k × 5% × 1x = $500 → $500/$100 = 5 units
        let qty = calculate_order_quantity(dec!(10000), dec!(100), &params(0.05, 1, 3)).unwrap();
        assert_eq!(qty, dec!(5));
    }

    #[test]
    fn test_leverage_is_capped() {
        // 10x requested, 3x allowed: $1000 × 10% × 3 = $300 → 3 units
        let qty = calculate_order_quantity(dec!(1000), dec!(100), &params(0.10, 10, 3)).unwrap();
        assert_eq!(qty, dec!(3));
        assert_eq!(effective_leverage(0, 5), 1);
        assert_eq!(effective_leverage(4, 5), 4);
    }

    #[test]
    fn test_below_minimum_notional() {
        // $100 × 5% = $5 < $10 minimum
        let result = calculate_order_quantity(dec!(100), dec!(100), &params(0.05, 1, 3));
        assert!(matches!(result, Err(SizingRejection::BelowMinimum { .. })));
    }

    #[test]
    fn test_zero_balance_and_bad_price() {
        assert_eq!(
            calculate_order_quantity(Decimal::ZERO, dec!(100), &params(0.05, 1, 3)),
            Err(SizingRejection::NoBalance)
        );
        assert_eq!(
            calculate_order_quantity(dec!(100), dec!(0), &params(0.05, 1, 3)),
            Err(SizingRejection::InvalidPrice(dec!(0)))
        );
    }

    #[test]
    fn test_invalid_risk() {
        let result = calculate_order_quantity(dec!(1000), dec!(10), &params(1.5, 1, 3));
        assert!(matches!(result, Err(SizingRejection::InvalidRisk(_))));
    }

    #[test]
    fn test_quantity_truncated_to_eight_decimals() {
        // $1000 × 5% = $50 / $30000 = 0.001666666...
        let qty = calculate_order_quantity(dec!(1000), dec!(30000), &params(0.05, 1, 1)).unwrap();
        assert_eq!(qty, dec!(0.00166666));
    }
}
