//! Summary metrics (§4.5 step 6), generalizing
//! `analytics::AnalyticsEngine::calculate` to the multi-symbol `TradeRecord`
//! vocabulary: buy-and-hold return, a √252-annualized Sharpe ratio (the
//! teacher's own `AnalyticsEngine` computes only the non-annualized ratio,
//! a gap noted in DESIGN.md), and an exit-reason histogram.

use std::collections::HashMap;

use core_types::{ExitReason, TradeRecord};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::result::{BacktestSummary, PortfolioHistoryPoint};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn summarize(
    history: &[PortfolioHistoryPoint],
    trades: &[TradeRecord],
    initial_capital: Decimal,
) -> BacktestSummary {
    let mut summary = BacktestSummary {
        total_trades: trades.len() as u32,
        ..Default::default()
    };

    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        if initial_capital > Decimal::ZERO {
            summary.total_return_pct =
                (last.portfolio_value - initial_capital) / initial_capital * dec!(100);
        }
        if first.buy_and_hold_value > Decimal::ZERO {
            summary.buy_and_hold_return_pct = (last.buy_and_hold_value - first.buy_and_hold_value)
                / first.buy_and_hold_value
                * dec!(100);
        }
    }

    summary.max_drawdown_pct = max_drawdown_pct(history);
    summary.sharpe_ratio = annualized_sharpe(history);

    if trades.is_empty() {
        return summary;
    }

    let mut gross_profit = Decimal::ZERO;
    let mut gross_loss = Decimal::ZERO;
    let mut wins = 0u32;
    let mut losses = 0u32;
    let mut largest_win = Decimal::ZERO;
    let mut largest_loss = Decimal::ZERO;
    let mut total_days_held = Decimal::ZERO;
    let mut histogram: HashMap<ExitReason, u32> = HashMap::new();

    for trade in trades {
        if trade.pnl.is_sign_positive() {
            gross_profit += trade.pnl;
            wins += 1;
            largest_win = largest_win.max(trade.pnl);
        } else {
            gross_loss += trade.pnl.abs();
            losses += 1;
            largest_loss = largest_loss.min(trade.pnl);
        }
        let days_held = (trade.exit_date - trade.entry_date).num_seconds() as f64 / 86_400.0;
        total_days_held += Decimal::from_f64_retain(days_held).unwrap_or(Decimal::ZERO);
        *histogram.entry(trade.exit_reason).or_insert(0) += 1;
    }

    summary.win_rate_pct = dec!(100) * Decimal::from(wins) / Decimal::from(trades.len() as u64);
    summary.average_win = if wins > 0 { gross_profit / Decimal::from(wins) } else { Decimal::ZERO };
    summary.average_loss = if losses > 0 { gross_loss / Decimal::from(losses) } else { Decimal::ZERO };
    summary.largest_win = largest_win;
    summary.largest_loss = largest_loss;
    summary.average_days_held = total_days_held / Decimal::from(trades.len() as u64);
    summary.profit_factor = if gross_loss > Decimal::ZERO {
        gross_profit / gross_loss
    } else {
        Decimal::ZERO
    };
    summary.exit_reason_histogram = histogram;

    summary
}

fn max_drawdown_pct(history: &[PortfolioHistoryPoint]) -> Decimal {
    let mut peak = match history.first() {
        Some(p) => p.portfolio_value,
        None => return Decimal::ZERO,
    };
    let mut max_dd = Decimal::ZERO;
    for point in history {
        if point.portfolio_value > peak {
            peak = point.portfolio_value;
        }
        if peak > Decimal::ZERO {
            let dd = (peak - point.portfolio_value) / peak * dec!(100);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn annualized_sharpe(history: &[PortfolioHistoryPoint]) -> Option<Decimal> {
    if history.len() < 3 {
        return None;
    }
    let returns: Vec<f64> = history
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].portfolio_value.to_f64()?;
            let curr = w[1].portfolio_value.to_f64()?;
            if prev == 0.0 {
                None
            } else {
                Some((curr - prev) / prev)
            }
        })
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    if variance <= 0.0 {
        return None;
    }
    let std_dev = variance.sqrt();
    let sharpe = (mean / std_dev) * TRADING_DAYS_PER_YEAR.sqrt();
    Decimal::from_f64_retain(sharpe)
}
