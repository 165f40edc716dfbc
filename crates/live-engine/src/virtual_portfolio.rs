//! The virtual per-deployment portfolio (§4.9). Multiple deployments can
//! share one live broker account; this reconstructs each deployment's own
//! cash/position/P&L view strictly from its own `DeploymentTrade` rows,
//! never from the broker's aggregate account. Grounded in
//! `executor::Portfolio::update_with_execution`'s weighted-average-entry
//! math, but deliberately does *not* reuse `engine::StateReconciler`'s
//! "overwrite local state from the broker's aggregate" pattern — that would
//! immediately conflate two deployments' positions in the same symbol.

use std::collections::HashMap;

use core_types::{DeploymentPosition, DeploymentTrade, OrderSide};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct VirtualPortfolio {
    pub deployment_id: Uuid,
    pub cash: Decimal,
    pub positions: HashMap<String, DeploymentPosition>,
    pub realized_pnl: Decimal,
}

impl VirtualPortfolio {
    /// Reconstructs a deployment's portfolio from its own trade ledger,
    /// in fill order. `trades` must already be sorted by `filled_at`
    /// ascending (the repository's `list_deployment_trades` guarantees
    /// this).
    pub fn reconstruct(deployment_id: Uuid, initial_capital: Decimal, trades: &[DeploymentTrade]) -> Self {
        let mut portfolio = Self {
            deployment_id,
            cash: initial_capital,
            positions: HashMap::new(),
            realized_pnl: Decimal::ZERO,
        };
        for trade in trades {
            portfolio.apply_trade(trade);
        }
        portfolio
    }

    /// Applies one more fill to the running reconstruction. Buys widen the
    /// position at a weighted-average entry price; sells reduce quantity and
    /// realize `(exit_price - entry_price) * quantity_sold`; a position that
    /// reaches zero quantity is dropped rather than kept at zero.
    pub fn apply_trade(&mut self, trade: &DeploymentTrade) {
        let notional = trade.price * trade.quantity;
        match trade.side {
            OrderSide::Buy => {
                self.cash -= notional;
                let entry = self.positions.entry(trade.symbol.clone()).or_insert(DeploymentPosition {
                    deployment_id: self.deployment_id,
                    symbol: trade.symbol.clone(),
                    quantity: Decimal::ZERO,
                    avg_entry_price: Decimal::ZERO,
                    realized_pnl: Decimal::ZERO,
                });
                let total_qty = entry.quantity + trade.quantity;
                entry.avg_entry_price = if total_qty.is_zero() {
                    Decimal::ZERO
                } else {
                    (entry.avg_entry_price * entry.quantity + trade.price * trade.quantity) / total_qty
                };
                entry.quantity = total_qty;
            }
            OrderSide::Sell => {
                self.cash += notional;
                if let Some(entry) = self.positions.get_mut(&trade.symbol) {
                    let realized = (trade.price - entry.avg_entry_price) * trade.quantity;
                    entry.realized_pnl += realized;
                    self.realized_pnl += realized;
                    entry.quantity -= trade.quantity;
                    if entry.quantity <= Decimal::ZERO {
                        self.positions.remove(&trade.symbol);
                    }
                }
            }
        }
    }

    /// Sum of `quantity * (current_price - entry_price)` across every open
    /// virtual position. A symbol with no known current price is skipped
    /// (rather than assumed flat), since that would silently understate risk.
    pub fn unrealized_pnl(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .filter_map(|p| current_prices.get(&p.symbol).map(|price| p.quantity * (*price - p.avg_entry_price)))
            .sum()
    }

    /// `virtual_cash + sum(virtual_position.quantity * current_price)`.
    pub fn portfolio_value(&self, current_prices: &HashMap<String, Decimal>) -> Decimal {
        let positions_value: Decimal = self
            .positions
            .values()
            .filter_map(|p| current_prices.get(&p.symbol).map(|price| p.quantity * *price))
            .sum();
        self.cash + positions_value
    }

    pub fn total_pnl(&self, initial_capital: Decimal, current_prices: &HashMap<String, Decimal>) -> Decimal {
        self.portfolio_value(current_prices) - initial_capital
    }

    pub fn total_return_pct(&self, initial_capital: Decimal, current_prices: &HashMap<String, Decimal>) -> Decimal {
        if initial_capital.is_zero() {
            return Decimal::ZERO;
        }
        self.total_pnl(initial_capital, current_prices) / initial_capital
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn trade(symbol: &str, side: OrderSide, qty: Decimal, price: Decimal) -> DeploymentTrade {
        DeploymentTrade {
            id: Uuid::new_v4(),
            deployment_id: Uuid::nil(),
            symbol: symbol.to_string(),
            side,
            quantity: qty,
            price,
            vendor_order_id: None,
            filled_at: Utc::now(),
        }
    }

    #[test]
    fn buy_then_partial_sell_realizes_correct_pnl() {
        let trades = vec![
            trade("AAPL", OrderSide::Buy, dec!(10), dec!(100)),
            trade("AAPL", OrderSide::Sell, dec!(4), dec!(120)),
        ];
        let portfolio = VirtualPortfolio::reconstruct(Uuid::nil(), dec!(10000), &trades);
        assert_eq!(portfolio.positions["AAPL"].quantity, dec!(6));
        assert_eq!(portfolio.realized_pnl, dec!(80)); // (120-100)*4
        assert_eq!(portfolio.cash, dec!(10000) - dec!(1000) + dec!(480));
    }

    #[test]
    fn flat_position_is_removed_not_kept_at_zero() {
        let trades = vec![
            trade("AAPL", OrderSide::Buy, dec!(5), dec!(100)),
            trade("AAPL", OrderSide::Sell, dec!(5), dec!(110)),
        ];
        let portfolio = VirtualPortfolio::reconstruct(Uuid::nil(), dec!(10000), &trades);
        assert!(!portfolio.positions.contains_key("AAPL"));
    }

    #[test]
    fn two_deployments_in_the_same_symbol_are_independent() {
        let a_trades = vec![trade("AAPL", OrderSide::Buy, dec!(10), dec!(100))];
        let b_trades = vec![trade("AAPL", OrderSide::Buy, dec!(3), dec!(150))];
        let a = VirtualPortfolio::reconstruct(Uuid::nil(), dec!(10000), &a_trades);
        let b = VirtualPortfolio::reconstruct(Uuid::nil(), dec!(5000), &b_trades);
        assert_eq!(a.positions["AAPL"].quantity, dec!(10));
        assert_eq!(b.positions["AAPL"].quantity, dec!(3));
        assert_eq!(a.positions["AAPL"].avg_entry_price, dec!(100));
        assert_eq!(b.positions["AAPL"].avg_entry_price, dec!(150));
    }

    #[test]
    fn portfolio_value_matches_cash_plus_marked_positions() {
        let trades = vec![trade("AAPL", OrderSide::Buy, dec!(10), dec!(100))];
        let portfolio = VirtualPortfolio::reconstruct(Uuid::nil(), dec!(10000), &trades);
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), dec!(105));
        assert_eq!(portfolio.portfolio_value(&prices), dec!(9000) + dec!(1050));
        assert_eq!(portfolio.unrealized_pnl(&prices), dec!(50));
    }
}
