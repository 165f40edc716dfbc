//! `SourceStrictRouter`: indexes one provider (and its rate limiter) per
//! `SentimentSource`. Looking a source up is a plain `HashMap` get keyed by
//! the enum — there is no "any available provider" path, so a request for
//! `reddit` can never be silently answered with `news` data.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use core_types::{DatasetCacheRow, SentimentSource};
use rust_decimal::Decimal;

use crate::aggregate::{aggregate_weighted, default_text_sentiment, TextSentimentFn};
use crate::cache::DatasetCacheStore;
use crate::error::SentimentError;
use crate::limiter::RollingWindowLimiter;
use crate::provider::SentimentProvider;

pub struct SourceStrictRouter {
    providers: HashMap<SentimentSource, Arc<dyn SentimentProvider>>,
    limiters: HashMap<SentimentSource, Arc<RollingWindowLimiter>>,
    cache: Arc<dyn DatasetCacheStore>,
    scorer: TextSentimentFn,
}

impl SourceStrictRouter {
    pub fn new(cache: Arc<dyn DatasetCacheStore>) -> Self {
        Self {
            providers: HashMap::new(),
            limiters: HashMap::new(),
            cache,
            scorer: default_text_sentiment,
        }
    }

    pub fn with_scorer(mut self, scorer: TextSentimentFn) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn register(&mut self, provider: Arc<dyn SentimentProvider>, limiter: Arc<RollingWindowLimiter>) {
        let source = provider.source();
        self.providers.insert(source, provider);
        self.limiters.insert(source, limiter);
    }

    /// Resolves a sentiment scalar for `(symbol, source, date)`. Cache-first,
    /// falling back to live retrieval (rate-limited) on a miss; a `None`
    /// result means no data exists anywhere for this exact source — it must
    /// never be backfilled from a different source.
    pub async fn sentiment(
        &self,
        symbol: &str,
        source: SentimentSource,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, SentimentError> {
        if let Some(row) = self.cache.lookup(symbol, source, date).await? {
            if let Some(entry) = row.data.get(&date.to_string()) {
                return Ok(parse_cached_sentiment(entry));
            }
        }

        let provider = self
            .providers
            .get(&source)
            .ok_or(SentimentError::NoProvider(source))?;
        let limiter = self
            .limiters
            .get(&source)
            .expect("a limiter is always registered alongside its provider");

        limiter.acquire().await;
        let posts = provider.fetch_posts(symbol, date).await?;
        let score = aggregate_weighted(&posts, self.scorer);

        if let Some(s) = score {
            let mut data = HashMap::new();
            data.insert(date.to_string(), serde_json::json!({ "sentiment": s.to_string() }));
            self.cache
                .upsert(DatasetCacheRow {
                    ticker: symbol.to_string(),
                    data_source: source,
                    start_date: date,
                    end_date: date,
                    data,
                    metadata: serde_json::Value::Null,
                    session_id: None,
                    bot_id: None,
                })
                .await?;
        }

        Ok(score)
    }
}

fn parse_cached_sentiment(entry: &serde_json::Value) -> Option<Decimal> {
    entry
        .get("sentiment")
        .and_then(|v| v.as_str())
        .and_then(|s| Decimal::from_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use async_trait::async_trait;
    use crate::aggregate::Post;
    use std::time::Duration;

    struct StubProvider(SentimentSource, Vec<Post>);

    #[async_trait]
    impl SentimentProvider for StubProvider {
        fn source(&self) -> SentimentSource {
            self.0
        }
        async fn fetch_posts(&self, _symbol: &str, _date: NaiveDate) -> Result<Vec<Post>, SentimentError> {
            Ok(self.1.clone())
        }
    }

    #[tokio::test]
    async fn requesting_reddit_never_returns_news_data() {
        let cache = Arc::new(InMemoryCacheStore::new());
        cache
            .upsert(DatasetCacheRow {
                ticker: "AAPL".to_string(),
                data_source: SentimentSource::News,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                data: HashMap::from([(
                    "2024-01-01".to_string(),
                    serde_json::json!({ "sentiment": "0.9" }),
                )]),
                metadata: serde_json::Value::Null,
                session_id: None,
                bot_id: None,
            })
            .await
            .unwrap();

        let mut router = SourceStrictRouter::new(cache);
        router.register(
            Arc::new(StubProvider(SentimentSource::Reddit, vec![])),
            Arc::new(RollingWindowLimiter::new(Duration::from_secs(60), 60)),
        );

        let result = router
            .sentiment("AAPL", SentimentSource::Reddit, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_provider_call() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        cache
            .upsert(DatasetCacheRow {
                ticker: "AAPL".to_string(),
                data_source: SentimentSource::Reddit,
                start_date: date,
                end_date: date,
                data: HashMap::from([(date.to_string(), serde_json::json!({ "sentiment": "0.42" }))]),
                metadata: serde_json::Value::Null,
                session_id: None,
                bot_id: None,
            })
            .await
            .unwrap();

        let router = SourceStrictRouter::new(cache);
        let result = router.sentiment("AAPL", SentimentSource::Reddit, date).await.unwrap();
        assert_eq!(result, Some(Decimal::new(42, 2)));
    }
}
