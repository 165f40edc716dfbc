//! A thin HTTP client for the LLM oracle backing the generator/analyst/
//! insights agents. No LLM SDK crate exists in the pack, so this is shaped
//! like `api_client::BinanceClient`: a `reqwest::Client` plus a base URL and
//! a bearer key, sending/receiving plain JSON.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::AgentError;

#[derive(Clone)]
pub struct OracleClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    system: &'a str,
    prompt: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct CompletionResponse {
    content: String,
}

impl OracleClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .build()
                .expect("failed to build oracle reqwest client"),
            base_url: base_url.into(),
        }
    }

    /// Sends `system`/`prompt` to the oracle's completion endpoint and
    /// parses the returned content as JSON into `T`, retrying the parse
    /// once on malformed JSON (per §4.7's single-retry note), bounded by
    /// `timeout`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<T, AgentError> {
        let call = self.client
            .post(format!("{}/v1/completions", self.base_url))
            .json(&CompletionRequest { system, prompt })
            .send();

        let response = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| AgentError::Timeout(timeout))??;

        let body: CompletionResponse = response.json().await?;

        match serde_json::from_str::<T>(&body.content) {
            Ok(parsed) => Ok(parsed),
            Err(first_err) => {
                let retry = self.client
                    .post(format!("{}/v1/completions", self.base_url))
                    .json(&CompletionRequest {
                        system,
                        prompt: &format!(
                            "{prompt}\n\nYour previous response failed to parse as JSON ({first_err}). Return ONLY valid JSON matching the requested shape."
                        ),
                    })
                    .send();

                let response = tokio::time::timeout(timeout, retry)
                    .await
                    .map_err(|_| AgentError::Timeout(timeout))??;
                let body: CompletionResponse = response.json().await?;

                serde_json::from_str(&body.content)
                    .map_err(|e| AgentError::MalformedResponse(e.to_string()))
            }
        }
    }

    /// Raw JSON call, for callers that want the `Value` tree directly
    /// rather than a typed struct (e.g. the insights agent's
    /// free-form visualization config).
    pub async fn complete_value(
        &self,
        system: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Value, AgentError> {
        self.complete_json(system, prompt, timeout).await
    }
}
