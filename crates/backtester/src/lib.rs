//! The multi-symbol, event-driven backtest core (§4.5). Generalizes
//! `Backtester::run()` (previously single-symbol, no buy-and-hold tracking,
//! no exit-reason histogram) into a union-of-dates loop over however many
//! symbols the strategy trades, modeled structurally on
//! `portfolio_backtester::load_and_prepare_data`'s join-all/flatten/sort-by-
//! timestamp master clock, but driven day-by-day against the new `Broker`
//! trait instead of the old single-signal `Executor`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use core_types::{Bar, ExitReason, OrderRequest, OrderSide, OrderType, TradeRecord};
use executor::{Broker, SimulatedBroker};
use rust_decimal::Decimal;
use strategies::{DataFeeds, DeclarativeStrategy, MultiAssetStrategy};
use uuid::Uuid;

pub mod error;
pub mod metrics;
pub mod result;
pub mod sizing;

pub use error::BacktestError;
pub use result::{AdditionalInfoRow, BacktestResult, BacktestSummary, PortfolioHistoryPoint};

struct OpenEntry {
    entry_date: NaiveDate,
}

/// Runs one deterministic backtest of `strategy` against `bars` over their
/// combined date range. The benchmark for the buy-and-hold line defaults to
/// the first symbol in the strategy's asset list.
pub struct BacktestEngine {
    broker: Arc<SimulatedBroker>,
    strategy: Box<dyn MultiAssetStrategy>,
    bars: HashMap<String, Vec<Bar>>,
    position_size_fraction: Decimal,
    initial_capital: Decimal,
    benchmark_symbol: Option<String>,
}

impl BacktestEngine {
    pub fn new(
        spec: core_types::StrategySpec,
        bars: HashMap<String, Vec<Bar>>,
        feeds: Box<dyn DataFeeds>,
        initial_capital: Decimal,
    ) -> Self {
        let benchmark_symbol = spec.assets.first().cloned();
        let position_size_fraction = spec.risk.position_size;
        let strategy: Box<dyn MultiAssetStrategy> =
            Box::new(DeclarativeStrategy::new(spec, feeds));
        Self {
            broker: Arc::new(SimulatedBroker::new(initial_capital)),
            strategy,
            bars,
            position_size_fraction,
            initial_capital,
            benchmark_symbol,
        }
    }

    pub async fn run(mut self) -> Result<BacktestResult, BacktestError> {
        if self.bars.values().all(|b| b.is_empty()) {
            return Err(BacktestError::DataUnavailable);
        }

        self.strategy.initialize();

        let by_symbol_date: HashMap<String, HashMap<NaiveDate, Bar>> = self
            .bars
            .iter()
            .map(|(symbol, bars)| {
                let map = bars
                    .iter()
                    .map(|b| (b.close_time.date_naive(), *b))
                    .collect::<HashMap<_, _>>();
                (symbol.clone(), map)
            })
            .collect();

        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        for bars in self.bars.values() {
            for b in bars {
                dates.insert(b.close_time.date_naive());
            }
        }
        let dates: Vec<NaiveDate> = dates.into_iter().collect();

        let mut portfolio_history = Vec::with_capacity(dates.len());
        let mut additional_info = Vec::new();
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut open_entries: HashMap<String, OpenEntry> = HashMap::new();
        let mut benchmark_shares: Option<Decimal> = None;

        for date in &dates {
            let mut bars_today: HashMap<String, Bar> = HashMap::new();
            for (symbol, by_date) in &by_symbol_date {
                if let Some(bar) = by_date.get(date) {
                    bars_today.insert(symbol.clone(), *bar);
                    self.broker.set_current_price(symbol, bar.close).await;
                }
            }
            if bars_today.is_empty() {
                continue;
            }

            if let Some(bench) = &self.benchmark_symbol {
                if benchmark_shares.is_none() {
                    if let Some(bar) = bars_today.get(bench) {
                        if bar.close > Decimal::ZERO {
                            benchmark_shares = Some(self.initial_capital / bar.close);
                        }
                    }
                }
            }

            let signals = self.strategy.generate_signals(&bars_today)?;

            for signal in signals {
                let mut order = signal.order_request.clone();
                let bar = match bars_today.get(&order.symbol) {
                    Some(b) => *b,
                    None => continue,
                };

                if order.side == OrderSide::Buy && order.quantity.is_zero() {
                    let equity = self.broker.get_account().await?.equity;
                    order.quantity =
                        sizing::shares_for_buy(equity, self.position_size_fraction, bar.close);
                    if order.quantity.is_zero() {
                        continue;
                    }
                }

                let position_before = if order.side == OrderSide::Sell {
                    self.broker.get_position(&order.symbol).await?
                } else {
                    None
                };

                let filled = self.broker.submit_order(&order).await?;
                if filled.status != core_types::OrderStatus::Filled {
                    continue;
                }
                let fill_price = filled.filled_avg_price.unwrap_or(bar.close);

                self.strategy
                    .on_execution(&order.symbol, order.side, filled.filled_qty, fill_price);

                match order.side {
                    OrderSide::Buy => {
                        open_entries
                            .entry(order.symbol.clone())
                            .or_insert(OpenEntry { entry_date: *date });
                    }
                    OrderSide::Sell => {
                        if let Some(prior) = position_before {
                            let exit_reason = self
                                .strategy
                                .last_exit_reason(&order.symbol)
                                .unwrap_or(ExitReason::SignalExit);
                            let entry_date = open_entries
                                .get(&order.symbol)
                                .map(|e| e.entry_date)
                                .unwrap_or(*date);
                            let sign = match prior.side {
                                OrderSide::Buy => Decimal::ONE,
                                OrderSide::Sell => -Decimal::ONE,
                            };
                            let pnl = sign * (fill_price - prior.entry_price) * filled.filled_qty;
                            let basis = prior.entry_price * filled.filled_qty;
                            let pnl_pct = if basis.is_zero() { Decimal::ZERO } else { pnl / basis };
                            trades.push(TradeRecord {
                                symbol: order.symbol.clone(),
                                entry_date: date_to_utc(entry_date),
                                exit_date: date_to_utc(*date),
                                entry_price: prior.entry_price,
                                exit_price: fill_price,
                                shares: filled.filled_qty,
                                pnl,
                                pnl_pct,
                                entry_reason: format!("entry condition matched on {entry_date}"),
                                exit_reason,
                            });
                        }
                        if self.broker.get_position(&order.symbol).await?.is_none() {
                            open_entries.remove(&order.symbol);
                        }
                    }
                }
            }

            for symbol in bars_today.keys() {
                let snapshot = self.strategy.additional_info(symbol, *date);
                additional_info.push(AdditionalInfoRow {
                    date: *date,
                    symbol: symbol.clone(),
                    indicators: snapshot.indicators,
                    sentiment: snapshot.sentiment,
                    position_held: snapshot.position_held,
                    entry_price: snapshot.entry_price,
                    unrealized_pnl_pct: snapshot.unrealized_pnl_pct,
                    stop_loss_level: snapshot.stop_loss_level,
                    take_profit_level: snapshot.take_profit_level,
                });
            }

            let account = self.broker.get_account().await?;
            let buy_and_hold_value = match (&self.benchmark_symbol, benchmark_shares) {
                (Some(bench), Some(shares)) => bars_today
                    .get(bench)
                    .map(|b| shares * b.close)
                    .unwrap_or(self.initial_capital),
                _ => self.initial_capital,
            };
            portfolio_history.push(PortfolioHistoryPoint {
                date: *date,
                portfolio_value: account.portfolio_value,
                cash: account.cash,
                positions_value: account.positions_value,
                price: bars_today.iter().map(|(s, b)| (s.clone(), b.close)).collect(),
                buy_and_hold_value,
            });
        }

        if let Some(last_date) = dates.last().copied() {
            self.force_close_open_positions(last_date, &by_symbol_date, &mut trades, &mut open_entries)
                .await?;
        }

        let summary = metrics::summarize(&portfolio_history, &trades, self.initial_capital);

        Ok(BacktestResult {
            portfolio_history,
            additional_info,
            trades,
            summary,
        })
    }

    /// §4.5 step 5: at the final date, forcibly close any open position at
    /// the last close and record a synthetic `end_of_period` trade.
    async fn force_close_open_positions(
        &self,
        last_date: NaiveDate,
        by_symbol_date: &HashMap<String, HashMap<NaiveDate, Bar>>,
        trades: &mut Vec<TradeRecord>,
        open_entries: &mut HashMap<String, OpenEntry>,
    ) -> Result<(), BacktestError> {
        for position in self.broker.get_all_positions().await? {
            let last_close = by_symbol_date
                .get(&position.symbol)
                .and_then(|m| m.get(&last_date))
                .map(|b| b.close)
                .unwrap_or(position.entry_price);
            self.broker.set_current_price(&position.symbol, last_close).await;

            let order = OrderRequest {
                client_order_id: Uuid::new_v4(),
                symbol: position.symbol.clone(),
                side: position.side.opposite(),
                order_type: OrderType::Market,
                quantity: position.quantity,
                price: None,
                position_side: None,
            };
            let filled = self.broker.submit_order(&order).await?;
            if filled.status != core_types::OrderStatus::Filled {
                continue;
            }
            let fill_price = filled.filled_avg_price.unwrap_or(last_close);
            let sign = match position.side {
                OrderSide::Buy => Decimal::ONE,
                OrderSide::Sell => -Decimal::ONE,
            };
            let pnl = sign * (fill_price - position.entry_price) * filled.filled_qty;
            let basis = position.entry_price * filled.filled_qty;
            let pnl_pct = if basis.is_zero() { Decimal::ZERO } else { pnl / basis };
            let entry_date = open_entries
                .remove(&position.symbol)
                .map(|e| e.entry_date)
                .unwrap_or(last_date);
            trades.push(TradeRecord {
                symbol: position.symbol.clone(),
                entry_date: date_to_utc(entry_date),
                exit_date: date_to_utc(last_date),
                entry_price: position.entry_price,
                exit_price: fill_price,
                shares: filled.filled_qty,
                pnl,
                pnl_pct,
                entry_reason: format!("entry condition matched on {entry_date}"),
                exit_reason: ExitReason::EndOfPeriod,
            });
        }
        Ok(())
    }
}

fn date_to_utc(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{
        AllocationMode, Comparison, ConditionSpec, ExitSpec, PriceTrigger, RiskSpec, StrategySpec,
    };
    use rust_decimal_macros::dec;
    use strategies::NoFeeds;

    fn bar(day: u32, close: Decimal) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 21, 0, 0).unwrap();
        Bar {
            open_time: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
            close_time: ts,
            interval: "1d".to_string(),
        }
    }

    fn price_any_strategy() -> StrategySpec {
        StrategySpec {
            name: "test".to_string(),
            assets: vec!["AAPL".to_string()],
            entry_conditions: vec![ConditionSpec::Price { trigger: PriceTrigger::Any }],
            exit: ExitSpec {
                take_profit: Some(dec!(0.05)),
                stop_loss: Some(dec!(0.05)),
                take_profit_pct_shares: dec!(1),
                stop_loss_pct_shares: dec!(1),
                custom_exit: None,
            },
            risk: RiskSpec {
                position_size: dec!(0.5),
                max_positions: 1,
                allocation: AllocationMode::Equal,
            },
            data_sources: vec![],
        }
    }

    #[tokio::test]
    async fn buys_on_first_bar_and_produces_portfolio_history() {
        let bars = HashMap::from([(
            "AAPL".to_string(),
            vec![bar(1, dec!(100)), bar(2, dec!(101)), bar(3, dec!(102))],
        )]);
        let engine = BacktestEngine::new(price_any_strategy(), bars, Box::new(NoFeeds), dec!(10000));
        let result = engine.run().await.unwrap();
        assert_eq!(result.portfolio_history.len(), 3);
        assert!(!result.additional_info.is_empty());
    }

    #[tokio::test]
    async fn force_closes_open_position_at_period_end() {
        let bars = HashMap::from([(
            "AAPL".to_string(),
            vec![bar(1, dec!(100)), bar(2, dec!(101))],
        )]);
        let engine = BacktestEngine::new(price_any_strategy(), bars, Box::new(NoFeeds), dec!(10000));
        let result = engine.run().await.unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfPeriod);
    }

    #[test]
    fn rsi_condition_construction_is_unaffected_by_backtester_changes() {
        let _ = ConditionSpec::Rsi {
            period: 14,
            threshold: dec!(30),
            comparison: Comparison::Below,
        };
    }
}
