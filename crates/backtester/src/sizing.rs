//! Default position sizer (§4.3): on `buy`, convert the strategy's
//! configured `position_size` fraction of current equity into a share count
//! at the current price; on `sell`, the quantity is already known (the full
//! or partial position being closed) and is passed through unchanged.

use rust_decimal::Decimal;

/// `floor(equity * fraction / price)`, clamped at zero so a sub-one-share
/// allocation never rounds up into a position the account can't afford.
pub fn shares_for_buy(equity: Decimal, fraction: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO || equity <= Decimal::ZERO || fraction <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let allocated = equity * fraction;
    (allocated / price).floor().max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn floors_to_whole_shares() {
        let shares = shares_for_buy(dec!(10000), dec!(0.1), dec!(333));
        assert_eq!(shares, dec!(3));
    }

    #[test]
    fn zero_price_yields_zero_shares() {
        assert_eq!(shares_for_buy(dec!(10000), dec!(0.1), Decimal::ZERO), Decimal::ZERO);
    }
}
