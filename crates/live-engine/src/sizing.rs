//! Live-tick position sizing (§4.8 step 3): prefer the deployment's
//! configured `max_position_size`, else fall back to a configured fraction
//! of current virtual cash. Distinct from `backtester::sizing::shares_for_buy`,
//! which always sizes off a fixed fraction of equity — a live deployment can
//! cap its notional per trade independently of total account size.

use rust_decimal::Decimal;

/// `floor(allocated_cash / price)`, where `allocated_cash` is
/// `max_position_size` if set, else `cash * fallback_fraction`. Returns zero
/// (never negative) when the price is non-positive or the allocation rounds
/// down to less than one share.
pub fn shares_for_entry(
    cash: Decimal,
    max_position_size: Option<Decimal>,
    fallback_fraction: Decimal,
    price: Decimal,
) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let allocated_cash = match max_position_size {
        Some(cap) => cap.min(cash),
        None => cash * fallback_fraction,
    };
    (allocated_cash / price).floor().max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn uses_max_position_size_when_set() {
        let shares = shares_for_entry(dec!(10000), Some(dec!(500)), dec!(0.1), dec!(100));
        assert_eq!(shares, dec!(5));
    }

    #[test]
    fn falls_back_to_cash_fraction_when_unset() {
        let shares = shares_for_entry(dec!(10000), None, dec!(0.1), dec!(100));
        assert_eq!(shares, dec!(10));
    }

    #[test]
    fn max_position_size_is_capped_by_available_cash() {
        let shares = shares_for_entry(dec!(300), Some(dec!(10000)), dec!(0.1), dec!(100));
        assert_eq!(shares, dec!(3));
    }

    #[test]
    fn zero_price_yields_zero_shares() {
        assert_eq!(shares_for_entry(dec!(10000), None, dec!(0.1), Decimal::ZERO), Decimal::ZERO);
    }
}
