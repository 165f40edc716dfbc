//! Bridges the backtest core's `(bars, feeds)` inputs to the outside world:
//! a cache-through kline fetcher (`database` first, `api_client` on a miss)
//! and a sentiment/news prefetcher built from `sentiment::SourceStrictRouter`,
//! resolving only the sources a strategy's conditions actually reference.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use api_client::ApiClient;
use chrono::{DateTime, Utc};
use core_types::{Bar, ConditionSpec, SentimentSource, StrategySpec};
use database::DbRepository;
use rust_decimal::Decimal;
use sentiment::SourceStrictRouter;
use strategies::PrefetchedFeeds;

use crate::error::WorkflowError;

const DAILY_INTERVAL: &str = "1d";

pub struct MarketDataSource {
    api_client: Arc<dyn ApiClient>,
    repo: Arc<DbRepository>,
    sentiment_router: Arc<SourceStrictRouter>,
}

impl MarketDataSource {
    pub fn new(
        api_client: Arc<dyn ApiClient>,
        repo: Arc<DbRepository>,
        sentiment_router: Arc<SourceStrictRouter>,
    ) -> Self {
        Self {
            api_client,
            repo,
            sentiment_router,
        }
    }

    /// Cache-through daily bars for one symbol: a hit in the `klines` table
    /// is returned as-is; a miss falls through to the exchange and the
    /// fetched bars are persisted for next time.
    async fn bars_for(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, WorkflowError> {
        let cached = self
            .repo
            .get_klines_by_date_range(symbol, DAILY_INTERVAL, start, end)
            .await?;
        if !cached.is_empty() {
            return Ok(cached);
        }

        let fetched = self
            .api_client
            .fetch_klines(symbol, DAILY_INTERVAL, start, end)
            .await
            .map_err(|e| WorkflowError::MarketData(e.to_string()))?;
        for kline in &fetched {
            self.repo.save_kline(symbol, kline).await?;
        }
        Ok(fetched)
    }

    /// §4.5 step 1: fetches daily bars for every symbol the strategy trades
    /// over the requested lookback window.
    pub async fn bars_for_strategy(
        &self,
        strategy: &StrategySpec,
        days: u32,
    ) -> Result<HashMap<String, Vec<Bar>>, WorkflowError> {
        let end = Utc::now();
        let start = end - chrono::Duration::days(days as i64);
        let mut bars = HashMap::with_capacity(strategy.assets.len());
        for symbol in &strategy.assets {
            bars.insert(symbol.clone(), self.bars_for(symbol, start, end).await?);
        }
        Ok(bars)
    }

    /// Resolves every `(symbol, source, date)` triple the strategy's
    /// conditions could reference, ahead of the backtest's synchronous
    /// per-date loop. A strategy with no sentiment/news conditions never
    /// touches the router.
    pub async fn feeds_for_strategy(
        &self,
        strategy: &StrategySpec,
        bars: &HashMap<String, Vec<Bar>>,
    ) -> Result<PrefetchedFeeds, WorkflowError> {
        let mut feeds = PrefetchedFeeds::new();
        let sources = sentiment_sources(strategy);
        let needs_news = uses_news(strategy);
        if sources.is_empty() && !needs_news {
            return Ok(feeds);
        }

        for symbol in &strategy.assets {
            let dates: BTreeSet<_> = bars
                .get(symbol)
                .map(|bars| bars.iter().map(|b| b.close_time.date_naive()).collect())
                .unwrap_or_default();

            for date in dates {
                for source in &sources {
                    if let Some(score) = self.sentiment_router.sentiment(symbol, *source, date).await? {
                        feeds.insert_sentiment(symbol, *source, date, score);
                    }
                }
                if needs_news {
                    if let Some(score) = self
                        .sentiment_router
                        .sentiment(symbol, SentimentSource::News, date)
                        .await?
                    {
                        feeds.insert_news_positive(symbol, date, score > Decimal::ZERO);
                    }
                }
            }
        }
        Ok(feeds)
    }
}

fn sentiment_sources(strategy: &StrategySpec) -> Vec<SentimentSource> {
    let mut sources = HashSet::new();
    for condition in strategy.entry_conditions.iter().chain(strategy.exit.custom_exit.iter()) {
        if let ConditionSpec::Sentiment { source, .. } = condition {
            sources.insert(*source);
        }
    }
    sources.into_iter().collect()
}

fn uses_news(strategy: &StrategySpec) -> bool {
    strategy
        .entry_conditions
        .iter()
        .chain(strategy.exit.custom_exit.iter())
        .any(|c| matches!(c, ConditionSpec::News))
}
