//! `SentimentProvider`: one async retrieval method per source, shaped after
//! `api_client::BinanceClient`'s reqwest-based HTTP client (base URL plus a
//! signed/keyed request), generalized to whatever auth scheme the named
//! provider needs.

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::SentimentSource;

use crate::aggregate::Post;
use crate::error::SentimentError;

#[async_trait]
pub trait SentimentProvider: Send + Sync {
    fn source(&self) -> SentimentSource;

    /// Retrieves the raw posts/articles mentioning `symbol` on `date`. An
    /// empty vec means genuinely nothing was found (not an error); callers
    /// aggregate this through `aggregate::aggregate_weighted`, which itself
    /// returns `None` for an empty slice.
    async fn fetch_posts(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Post>, SentimentError>;
}

/// A `reqwest`-based provider for one of the three named sources. Credentials
/// (if any) are read once at construction from the environment, never stored
/// in configuration files, matching `BrokerConfig`'s convention.
pub struct HttpSentimentProvider {
    source: SentimentSource,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSentimentProvider {
    pub fn new(source: SentimentSource, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            source,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(serde::Deserialize)]
struct RawPost {
    text: String,
    score: i64,
}

#[async_trait]
impl SentimentProvider for HttpSentimentProvider {
    fn source(&self) -> SentimentSource {
        self.source
    }

    async fn fetch_posts(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Post>, SentimentError> {
        let mut request = self
            .client
            .get(format!("{}/posts", self.base_url))
            .query(&[("symbol", symbol), ("date", &date.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SentimentError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SentimentError::Request(format!(
                "provider returned status {}",
                response.status()
            )));
        }
        let raw: Vec<RawPost> = response
            .json()
            .await
            .map_err(|e| SentimentError::Deserialization(e.to_string()))?;
        Ok(raw
            .into_iter()
            .map(|r| Post { text: r.text, score: r.score })
            .collect())
    }
}
