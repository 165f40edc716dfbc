//! The spec-driven strategy: the concrete `MultiAssetStrategy` the backtest
//! core and live engine actually run. Unlike `MACrossover`/`SuperTrend`/etc.,
//! which hardcode one condition's logic into the type, a `DeclarativeStrategy`
//! wraps a `StrategySpec` and delegates per-bar, per-symbol evaluation to the
//! condition dispatcher (`crate::conditions`).

use std::collections::HashMap;

use chrono::NaiveDate;
use core_types::{
    Bar, ConditionSpec, ExitReason, OrderRequest, OrderSide, OrderType, SentimentSource, Signal,
    StrategySpec,
};
use indicators::{IndicatorEngine, MacdReading, Reading};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::conditions::{self, ConditionContext};
use crate::error::StrategyError;
use crate::feeds::DataFeeds;

/// A trait all strategies hosted by the backtest core / live engine
/// implement: `initialize` sets parameters once, `generate_signals` is a
/// pure function of current bars plus state the runtime itself maintains
/// (bar history, indicators, and each symbol's open-position bookkeeping).
pub trait MultiAssetStrategy: Send + Sync {
    fn initialize(&mut self);

    fn generate_signals(
        &mut self,
        bars: &HashMap<String, Bar>,
    ) -> Result<Vec<Signal>, StrategyError>;

    /// Lets the runtime inform the strategy of a fill so its internal
    /// position bookkeeping (needed to decide exits) stays in sync with
    /// what actually executed, rather than what it merely requested.
    fn on_execution(&mut self, symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal);

    /// The `ExitReason` classification for an exit signal generated during the
    /// most recent `generate_signals` call, if any. Kept off `Signal` itself
    /// since hand-written strategies have no notion of exit-reason
    /// classification; only the declarative runtime needs it, for the
    /// backtest summary's exit-reason histogram.
    fn last_exit_reason(&self, _symbol: &str) -> Option<ExitReason> {
        None
    }

    /// A per-day diagnostic snapshot for the backtest core's `additional_info`
    /// rows. Strategies with no such notion return the default (empty).
    fn additional_info(&self, _symbol: &str, _date: NaiveDate) -> AdditionalInfoSnapshot {
        AdditionalInfoSnapshot::default()
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    side: OrderSide,
    quantity: Decimal,
    entry_price: Decimal,
    entry_shares_at_open: Decimal,
    has_taken_partial_exit: bool,
    peak_since_partial: Decimal,
}

/// A per-`(date, symbol)` snapshot of the runtime state the backtest core's
/// `additional_info` rows need: the indicator values behind this strategy's
/// own conditions, any resolved sentiment, and (if a position is open) its
/// entry price, unrealized P&L, and the stop-loss/take-profit price levels
/// implied by the exit spec.
#[derive(Debug, Clone, Default)]
pub struct AdditionalInfoSnapshot {
    pub indicators: HashMap<String, Decimal>,
    pub sentiment: HashMap<String, Decimal>,
    pub position_held: bool,
    pub entry_price: Option<Decimal>,
    pub unrealized_pnl_pct: Option<Decimal>,
    pub stop_loss_level: Option<Decimal>,
    pub take_profit_level: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PrevSnapshot {
    sma: Option<(Decimal, Decimal)>,
    macd: Option<MacdReading>,
}

pub struct DeclarativeStrategy {
    spec: StrategySpec,
    indicators: IndicatorEngine,
    positions: HashMap<String, OpenPosition>,
    prev_snapshots: HashMap<String, PrevSnapshot>,
    feeds: Box<dyn DataFeeds>,
    last_exit_reasons: HashMap<String, ExitReason>,
}

impl DeclarativeStrategy {
    pub fn new(spec: StrategySpec, feeds: Box<dyn DataFeeds>) -> Self {
        Self {
            spec,
            indicators: IndicatorEngine::new(250),
            positions: HashMap::new(),
            prev_snapshots: HashMap::new(),
            feeds,
            last_exit_reasons: HashMap::new(),
        }
    }

    /// Swaps the data feeds backing sentiment/news conditions without
    /// disturbing indicator or position state. The live engine prefetches
    /// one tick's worth of sentiment ahead of a synchronous
    /// `generate_signals` call (the same "prefetch, then evaluate
    /// synchronously" split the backtest core uses over an entire run) and
    /// installs it here before every tick.
    pub fn refresh_feeds(&mut self, feeds: Box<dyn DataFeeds>) {
        self.feeds = feeds;
    }

    pub fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    fn sma_periods(&self) -> (usize, usize) {
        self.spec
            .entry_conditions
            .iter()
            .find_map(|c| match c {
                ConditionSpec::Sma {
                    fast_period,
                    slow_period,
                } => Some((*fast_period, *slow_period)),
                _ => None,
            })
            .unwrap_or((10, 50))
    }

    fn build_context<'a>(
        &'a self,
        symbol: &str,
        bar: &'a Bar,
        date: NaiveDate,
        condition: &ConditionSpec,
    ) -> ConditionContext<'a> {
        let ind = self.indicators.symbol(symbol).expect("bar was just pushed");
        let prev = self.prev_snapshots.get(symbol).copied().unwrap_or_default();
        let sentiment = match condition {
            ConditionSpec::Sentiment { source, .. } => self.feeds.sentiment(symbol, *source, date),
            _ => None,
        };
        let news_positive = if matches!(condition, ConditionSpec::News) {
            self.feeds.news_positive(symbol, date)
        } else {
            None
        };
        ConditionContext {
            bar,
            bar_history: &[],
            indicators: ind,
            prev_sma: prev.sma,
            prev_macd: prev.macd,
            sentiment,
            news_positive,
        }
    }

    fn evaluate_entry(&self, symbol: &str, bar: &Bar, date: NaiveDate) -> Option<String> {
        for condition in &self.spec.entry_conditions {
            let ctx = self.build_context(symbol, bar, date, condition);
            let (matched, reason) = conditions::evaluate(condition, &ctx);
            if matched {
                return Some(reason);
            }
        }
        None
    }

    /// Exit priority: custom exit first, then stop-loss, then take-profit.
    /// At most one exit fires per bar. Returns `(reason, ExitReason, sell_qty)`.
    fn evaluate_exit(
        &self,
        symbol: &str,
        bar: &Bar,
        date: NaiveDate,
        position: &OpenPosition,
    ) -> Option<(String, ExitReason, Decimal)> {
        if let Some(custom) = &self.spec.exit.custom_exit {
            let ctx = self.build_context(symbol, bar, date, custom);
            let (matched, reason) = conditions::evaluate(custom, &ctx);
            if matched {
                return Some((reason, ExitReason::CustomExit, position.quantity));
            }
        }

        let pnl_pct = match position.side {
            OrderSide::Buy => (bar.close - position.entry_price) / position.entry_price,
            OrderSide::Sell => (position.entry_price - bar.close) / position.entry_price,
        };

        if position.has_taken_partial_exit {
            // Remainder is governed by a trailing stop off the peak price
            // observed since the partial exit fired — not by the original
            // take-profit condition, which must not re-trigger (no cascading
            // partial exits).
            if let Some(stop_loss) = self.spec.exit.stop_loss {
                let trail_pct = (position.peak_since_partial - bar.close) / position.peak_since_partial;
                if trail_pct >= stop_loss {
                    return Some((
                        format!("trailing stop: {trail_pct} >= {stop_loss} off peak {}", position.peak_since_partial),
                        ExitReason::TrailingStop,
                        position.quantity,
                    ));
                }
            }
            return None;
        }

        if let Some(stop_loss) = self.spec.exit.stop_loss {
            if pnl_pct <= -stop_loss {
                return Some((
                    format!("stop-loss: pnl_pct {pnl_pct} <= -{stop_loss}"),
                    ExitReason::StopLoss,
                    position.quantity,
                ));
            }
        }

        if let Some(take_profit) = self.spec.exit.take_profit {
            if pnl_pct >= take_profit {
                let sell_qty = if self.spec.exit.is_two_phase_exit() {
                    (position.entry_shares_at_open * self.spec.exit.take_profit_pct_shares).round()
                } else {
                    position.quantity
                };
                let reason = if self.spec.exit.is_two_phase_exit() {
                    ExitReason::PartialExit
                } else {
                    ExitReason::TakeProfit
                };
                return Some((
                    format!("take-profit: pnl_pct {pnl_pct} >= {take_profit}"),
                    reason,
                    sell_qty,
                ));
            }
        }

        None
    }
}

impl MultiAssetStrategy for DeclarativeStrategy {
    fn initialize(&mut self) {
        tracing::info!(strategy = %self.spec.name, assets = ?self.spec.assets, "declarative strategy initialized");
    }

    fn generate_signals(
        &mut self,
        bars: &HashMap<String, Bar>,
    ) -> Result<Vec<Signal>, StrategyError> {
        let mut signals = Vec::new();
        let (fast, slow) = self.sma_periods();
        self.last_exit_reasons.clear();

        for symbol in &self.spec.assets {
            let bar = match bars.get(symbol) {
                Some(b) => b,
                None => continue,
            };
            let date = bar.close_time.date_naive();

            let prev_sma = self.indicators.symbol(symbol).map(|ind| {
                (ind.sma(fast), ind.sma(slow))
            });
            let prev_macd = self.indicators.symbol(symbol).and_then(|ind| ind.macd(12, 26, 9));
            self.indicators.push_bar(symbol, *bar);
            let prev_sma_pair = match prev_sma {
                Some((Reading::Value(f), Reading::Value(s))) => Some((f, s)),
                _ => None,
            };
            self.prev_snapshots.insert(
                symbol.clone(),
                PrevSnapshot {
                    sma: prev_sma_pair,
                    macd: prev_macd,
                },
            );

            if let Some(position) = self.positions.get(symbol).copied() {
                let updated_peak = position.peak_since_partial.max(bar.close);
                if let Some(pos) = self.positions.get_mut(symbol) {
                    pos.peak_since_partial = updated_peak;
                }
                let position = self.positions.get(symbol).copied().unwrap();
                if let Some((reason, exit_reason, qty)) = self.evaluate_exit(symbol, bar, date, &position) {
                    let side = position.side.opposite();
                    signals.push(Signal {
                        signal_id: Uuid::new_v4(),
                        timestamp: bar.close_time,
                        confidence: Decimal::ONE,
                        order_request: OrderRequest {
                            client_order_id: Uuid::new_v4(),
                            symbol: symbol.clone(),
                            side,
                            order_type: OrderType::Market,
                            quantity: qty,
                            price: None,
                            position_side: None,
                        },
                    });
                    tracing::debug!(symbol, reason, exit_kind = ?exit_reason, "exit signal generated");
                    self.last_exit_reasons.insert(symbol.clone(), exit_reason);
                    if exit_reason == ExitReason::PartialExit {
                        if let Some(pos) = self.positions.get_mut(symbol) {
                            pos.has_taken_partial_exit = true;
                            pos.peak_since_partial = bar.close;
                        }
                    }
                }
            } else if let Some(reason) = self.evaluate_entry(symbol, bar, date) {
                tracing::debug!(symbol, reason, "entry signal generated");
                signals.push(Signal {
                    signal_id: Uuid::new_v4(),
                    timestamp: bar.close_time,
                    confidence: Decimal::ONE,
                    order_request: OrderRequest {
                        client_order_id: Uuid::new_v4(),
                        symbol: symbol.clone(),
                        side: OrderSide::Buy,
                        order_type: OrderType::Market,
                        // Sizing is left to the runtime's default
                        // position-sizer / risk manager, same convention as
                        // the hand-written strategies in this workspace.
                        quantity: Decimal::ZERO,
                        price: None,
                        position_side: None,
                    },
                });
            }
        }

        Ok(signals)
    }

    fn on_execution(&mut self, symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal) {
        match self.positions.get_mut(symbol) {
            Some(pos) if pos.side == side => {
                let total_qty = pos.quantity + quantity;
                pos.entry_price = (pos.entry_price * pos.quantity + price * quantity) / total_qty;
                pos.quantity = total_qty;
            }
            Some(pos) => {
                pos.quantity -= quantity;
                if pos.quantity <= Decimal::ZERO {
                    self.positions.remove(symbol);
                }
            }
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    OpenPosition {
                        side,
                        quantity,
                        entry_price: price,
                        entry_shares_at_open: quantity,
                        has_taken_partial_exit: false,
                        peak_since_partial: price,
                    },
                );
            }
        }
    }

    fn last_exit_reason(&self, symbol: &str) -> Option<ExitReason> {
        self.last_exit_reasons.get(symbol).copied()
    }

    fn additional_info(&self, symbol: &str, date: NaiveDate) -> AdditionalInfoSnapshot {
        let mut snapshot = AdditionalInfoSnapshot::default();
        let Some(ind) = self.indicators.symbol(symbol) else {
            return snapshot;
        };

        let conditions = self
            .spec
            .entry_conditions
            .iter()
            .chain(self.spec.exit.custom_exit.iter());
        for condition in conditions {
            match condition {
                ConditionSpec::Rsi { period, .. } => {
                    if let Reading::Value(v) = ind.rsi(*period) {
                        snapshot.indicators.insert(format!("rsi_{period}"), v);
                    }
                }
                ConditionSpec::Sma {
                    fast_period,
                    slow_period,
                } => {
                    if let Reading::Value(v) = ind.sma(*fast_period) {
                        snapshot.indicators.insert(format!("sma_{fast_period}"), v);
                    }
                    if let Reading::Value(v) = ind.sma(*slow_period) {
                        snapshot.indicators.insert(format!("sma_{slow_period}"), v);
                    }
                }
                ConditionSpec::Macd { .. } => {
                    if let Some(m) = ind.macd(12, 26, 9) {
                        snapshot.indicators.insert("macd".to_string(), m.macd);
                        snapshot.indicators.insert("macd_signal".to_string(), m.signal);
                    }
                }
                ConditionSpec::Sentiment { source, .. } => {
                    if let Some(v) = self.feeds.sentiment(symbol, *source, date) {
                        snapshot.sentiment.insert(source_label(*source), v);
                    }
                }
                ConditionSpec::News | ConditionSpec::Price { .. } | ConditionSpec::Custom { .. } => {}
            }
        }

        if let Some(position) = self.positions.get(symbol) {
            snapshot.position_held = true;
            snapshot.entry_price = Some(position.entry_price);
            let last_close = ind.closes().last().copied();
            if let Some(close) = last_close {
                let pnl_pct = match position.side {
                    OrderSide::Buy => (close - position.entry_price) / position.entry_price,
                    OrderSide::Sell => (position.entry_price - close) / position.entry_price,
                };
                snapshot.unrealized_pnl_pct = Some(pnl_pct);
            }
            if let Some(stop_loss) = self.spec.exit.stop_loss {
                snapshot.stop_loss_level = Some(match position.side {
                    OrderSide::Buy => position.entry_price * (Decimal::ONE - stop_loss),
                    OrderSide::Sell => position.entry_price * (Decimal::ONE + stop_loss),
                });
            }
            if let Some(take_profit) = self.spec.exit.take_profit {
                snapshot.take_profit_level = Some(match position.side {
                    OrderSide::Buy => position.entry_price * (Decimal::ONE + take_profit),
                    OrderSide::Sell => position.entry_price * (Decimal::ONE - take_profit),
                });
            }
        }

        snapshot
    }
}

fn source_label(source: SentimentSource) -> String {
    match source {
        SentimentSource::Reddit => "reddit".to_string(),
        SentimentSource::Twitter => "twitter".to_string(),
        SentimentSource::News => "news".to_string(),
    }
}
