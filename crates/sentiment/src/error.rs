use thiserror::Error;

/// Covers the `UpstreamDataError` kind for the sentiment/news path: a
/// per-symbol failure is skipped with a warning by the caller, it does not
/// by itself halt a backtest or a live tick.
#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("failed to parse provider response: {0}")]
    Deserialization(String),

    #[error("no provider registered for source {0:?}")]
    NoProvider(core_types::SentimentSource),

    #[error("cache store error: {0}")]
    Cache(String),
}
