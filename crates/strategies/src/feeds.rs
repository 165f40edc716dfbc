//! The data feeds a declarative strategy consults while evaluating
//! conditions, kept behind a trait so the backtester can supply a
//! cache-backed implementation and the live engine a live-retrieval one
//! without either this crate depending on `sentiment` or `database`.

use std::collections::HashMap;

use chrono::NaiveDate;
use core_types::SentimentSource;
use rust_decimal::Decimal;

pub trait DataFeeds: Send + Sync {
    /// Resolved sentiment scalar for `(symbol, source, date)`. `None` means
    /// no data was found for that exact source — never a cross-source
    /// substitution.
    fn sentiment(&self, symbol: &str, source: SentimentSource, date: NaiveDate) -> Option<Decimal>;

    /// Whether a news bundle for `(symbol, date)` carries a positive label.
    /// `None` means there was no news bundle for that day.
    fn news_positive(&self, symbol: &str, date: NaiveDate) -> Option<bool>;
}

/// A `DataFeeds` that never has data. Useful for strategies whose conditions
/// never reference `sentiment`/`news`, and for tests.
pub struct NoFeeds;

impl DataFeeds for NoFeeds {
    fn sentiment(&self, _symbol: &str, _source: SentimentSource, _date: NaiveDate) -> Option<Decimal> {
        None
    }

    fn news_positive(&self, _symbol: &str, _date: NaiveDate) -> Option<bool> {
        None
    }
}

/// A `DataFeeds` backed by a plain lookup table, resolved ahead of time by an
/// async caller (the backtest core prefetches an entire run's date range
/// before the synchronous per-date loop starts; the live engine prefetches
/// one day per tick). Evaluating a condition never itself awaits anything —
/// this is what keeps `generate_signals` synchronous end to end.
#[derive(Default)]
pub struct PrefetchedFeeds {
    sentiment: HashMap<(String, SentimentSource, NaiveDate), Decimal>,
    news_positive: HashMap<(String, NaiveDate), bool>,
}

impl PrefetchedFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sentiment(&mut self, symbol: &str, source: SentimentSource, date: NaiveDate, value: Decimal) {
        self.sentiment.insert((symbol.to_string(), source, date), value);
    }

    pub fn insert_news_positive(&mut self, symbol: &str, date: NaiveDate, positive: bool) {
        self.news_positive.insert((symbol.to_string(), date), positive);
    }
}

impl DataFeeds for PrefetchedFeeds {
    fn sentiment(&self, symbol: &str, source: SentimentSource, date: NaiveDate) -> Option<Decimal> {
        self.sentiment.get(&(symbol.to_string(), source, date)).copied()
    }

    fn news_positive(&self, symbol: &str, date: NaiveDate) -> Option<bool> {
        self.news_positive.get(&(symbol.to_string(), date)).copied()
    }
}
