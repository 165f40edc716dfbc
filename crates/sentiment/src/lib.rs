//! Sentiment adapter + dataset cache (§4.6): a `SentimentProvider` per
//! source, a `SourceStrictRouter` that never substitutes one source's data
//! for another's, a rolling-window rate limiter, and score-weighted
//! aggregation of retrieved posts into a single scalar per `(symbol,
//! source, date)`.

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod limiter;
pub mod provider;
pub mod router;

pub use aggregate::{aggregate_weighted, default_text_sentiment, Post, TextSentimentFn};
pub use cache::{DatasetCacheStore, InMemoryCacheStore};
pub use error::SentimentError;
pub use limiter::RollingWindowLimiter;
pub use provider::{HttpSentimentProvider, SentimentProvider};
pub use router::SourceStrictRouter;
