//! The result bundle a backtest run produces (§3/§4.5): a daily portfolio
//! history (with a buy-and-hold benchmark line), per-day diagnostic rows,
//! the closed-trade ledger, and a summary metrics bundle.

use std::collections::HashMap;

use chrono::NaiveDate;
use core_types::{ExitReason, TradeRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioHistoryPoint {
    pub date: NaiveDate,
    pub portfolio_value: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub price: HashMap<String, Decimal>,
    pub buy_and_hold_value: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdditionalInfoRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub indicators: HashMap<String, Decimal>,
    pub sentiment: HashMap<String, Decimal>,
    pub position_held: bool,
    pub entry_price: Option<Decimal>,
    pub unrealized_pnl_pct: Option<Decimal>,
    pub stop_loss_level: Option<Decimal>,
    pub take_profit_level: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_trades: u32,
    pub total_return_pct: Decimal,
    pub buy_and_hold_return_pct: Decimal,
    pub sharpe_ratio: Option<Decimal>,
    pub max_drawdown_pct: Decimal,
    pub win_rate_pct: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub average_days_held: Decimal,
    pub profit_factor: Decimal,
    pub exit_reason_histogram: HashMap<ExitReason, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub portfolio_history: Vec<PortfolioHistoryPoint>,
    pub additional_info: Vec<AdditionalInfoRow>,
    pub trades: Vec<TradeRecord>,
    pub summary: BacktestSummary,
}
