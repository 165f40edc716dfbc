//! Per-symbol rolling indicator engine.
//!
//! Mirrors the rolling-buffer-plus-incremental-recompute style already used by
//! `strategies::ma_crossover::MACrossover` (there backed directly by the `ta`
//! crate's `SimpleMovingAverage`), generalized to the full RSI/SMA/EMA/MACD set
//! and to an explicit "insufficient data" reading instead of a sentinel number.

use core_types::Bar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

pub mod error;

pub use error::IndicatorError;

/// An indicator value that is either available, or not yet computable because
/// the rolling window hasn't seen enough bars. Consumers must match on this
/// rather than treat an arbitrary number as "no data".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Unavailable,
    Value(Decimal),
}

impl Reading {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

/// RSI's period + 1 special case: the spec requires a seed value of 50 (not
/// "unavailable") until enough bars have accumulated, since a mean-reversion
/// strategy reading RSI on day one needs a defined, neutral value rather than
/// an absent one.
const RSI_SEED_VALUE: i64 = 50;

/// A rolling OHLCV buffer plus the indicators computed over it for one symbol.
/// Bars must be pushed in nondecreasing timestamp order; the engine does not
/// itself validate ordering (the backtest/live engine's union-of-dates driver
/// already guarantees it).
#[derive(Debug, Clone)]
pub struct SymbolIndicators {
    bars: VecDeque<Bar>,
    max_window: usize,
}

impl SymbolIndicators {
    pub fn new(max_window: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(max_window),
            max_window,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        self.bars.push_back(bar);
        while self.bars.len() > self.max_window {
            self.bars.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highest_high(&self, lookback: usize) -> Option<Decimal> {
        if self.bars.len() < lookback {
            return None;
        }
        self.bars
            .iter()
            .rev()
            .take(lookback)
            .map(|b| b.high)
            .reduce(|a, b| a.max(b))
    }

    /// Simple moving average over `period` closes. `Unavailable` until the
    /// window has `period` bars.
    pub fn sma(&self, period: usize) -> Reading {
        if period == 0 || self.bars.len() < period {
            return Reading::Unavailable;
        }
        let sum: Decimal = self.bars.iter().rev().take(period).map(|b| b.close).sum();
        Reading::Value(sum / Decimal::from(period as u64))
    }

    /// Exponential moving average over `span` closes, seeded with a simple
    /// average of the first `span` closes. `Unavailable` until the window has
    /// `span` bars.
    pub fn ema(&self, span: usize) -> Reading {
        match ema_series(&self.closes(), span) {
            Some(series) => Reading::Value(*series.last().unwrap()),
            None => Reading::Unavailable,
        }
    }

    /// Wilder-style RSI over `period` closes. Returns the documented seed
    /// value of 50 until `period + 1` bars are available (one more than a
    /// plain average needs, since RSI requires bar-over-bar deltas).
    pub fn rsi(&self, period: usize) -> Reading {
        if period == 0 {
            return Reading::Unavailable;
        }
        if self.bars.len() < period + 1 {
            return Reading::Value(Decimal::from(RSI_SEED_VALUE));
        }
        let closes: Vec<Decimal> = self.closes();
        let window = &closes[closes.len() - (period + 1)..];
        let mut gains = Decimal::ZERO;
        let mut losses = Decimal::ZERO;
        for pair in window.windows(2) {
            let delta = pair[1] - pair[0];
            if delta.is_sign_positive() {
                gains += delta;
            } else {
                losses += -delta;
            }
        }
        let avg_gain = gains / Decimal::from(period as u64);
        let avg_loss = losses / Decimal::from(period as u64);
        if avg_loss.is_zero() {
            return Reading::Value(Decimal::from(100));
        }
        let rs = avg_gain / avg_loss;
        let hundred = Decimal::from(100);
        Reading::Value(hundred - (hundred / (Decimal::ONE + rs)))
    }

    /// MACD(fast, slow, signal) computed from EMA series over the full
    /// buffered close history. `Unavailable` until `slow + signal` closes
    /// have accumulated (the signal line is itself an EMA of the MACD line).
    pub fn macd(&self, fast: usize, slow: usize, signal: usize) -> Option<MacdReading> {
        let closes = self.closes();
        let fast_series = ema_series(&closes, fast)?;
        let slow_series = ema_series(&closes, slow)?;
        let offset = fast_series.len() - slow_series.len();
        let macd_line: Vec<Decimal> = slow_series
            .iter()
            .enumerate()
            .map(|(i, slow_v)| fast_series[i + offset] - slow_v)
            .collect();
        let signal_series = ema_series(&macd_line, signal)?;
        let macd_last = *macd_line.last()?;
        let signal_last = *signal_series.last()?;
        Some(MacdReading {
            macd: macd_last,
            signal: signal_last,
            histogram: macd_last - signal_last,
        })
    }
}

/// Full EMA series for `span`, seeded with a simple average of the first
/// `span` values. Returns `None` if fewer than `span` values are given.
fn ema_series(values: &[Decimal], span: usize) -> Option<Vec<Decimal>> {
    if span == 0 || values.len() < span {
        return None;
    }
    let alpha = Decimal::from(2) / Decimal::from((span + 1) as u64);
    let seed: Decimal = values[..span].iter().sum::<Decimal>() / Decimal::from(span as u64);
    let mut series = Vec::with_capacity(values.len() - span + 1);
    series.push(seed);
    for v in &values[span..] {
        let prev = *series.last().unwrap();
        series.push(alpha * (*v - prev) + prev);
    }
    Some(series)
}

/// Owns one `SymbolIndicators` per symbol; the top-level entry point the
/// backtest core and live engine push bars into.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    per_symbol: HashMap<String, SymbolIndicators>,
    max_window: usize,
}

impl IndicatorEngine {
    pub fn new(max_window: usize) -> Self {
        Self {
            per_symbol: HashMap::new(),
            max_window,
        }
    }

    pub fn push_bar(&mut self, symbol: &str, bar: Bar) {
        self.per_symbol
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolIndicators::new(self.max_window))
            .push(bar);
    }

    /// Returns `None` if the symbol has never been seen, as distinct from
    /// `Reading::Unavailable` for an individual indicator on a known symbol.
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolIndicators> {
        self.per_symbol.get(symbol)
    }
}

pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(close: Decimal) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
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

    #[test]
    fn rsi_returns_seed_before_enough_bars() {
        let mut ind = SymbolIndicators::new(50);
        ind.push(bar(dec!(100)));
        ind.push(bar(dec!(101)));
        assert_eq!(ind.rsi(14), Reading::Value(Decimal::from(50)));
    }

    #[test]
    fn sma_unavailable_before_period() {
        let mut ind = SymbolIndicators::new(50);
        for p in [dec!(10), dec!(11), dec!(12)] {
            ind.push(bar(p));
        }
        assert_eq!(ind.sma(5), Reading::Unavailable);
        assert_eq!(ind.sma(3), Reading::Value(dec!(11)));
    }

    #[test]
    fn rsi_all_gains_saturates_to_100() {
        let mut ind = SymbolIndicators::new(50);
        let mut price = dec!(100);
        for _ in 0..20 {
            ind.push(bar(price));
            price += dec!(1);
        }
        assert_eq!(ind.rsi(14), Reading::Value(Decimal::from(100)));
    }

    #[test]
    fn macd_unavailable_until_enough_history() {
        let mut ind = SymbolIndicators::new(60);
        for _ in 0..10 {
            ind.push(bar(dec!(100)));
        }
        assert!(ind.macd(12, 26, 9).is_none());
    }
}
