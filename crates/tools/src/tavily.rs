//! Tavily search backend.
//!
//! POSTs `{api_key, query, max_results}` to the Tavily search endpoint and
//! maps `results[].{title, url, content}` onto [`SearchHit`]s.

use async_trait::async_trait;
use reflexion_core::error::LookupError;
use reflexion_core::lookup::{EvidenceLookup, SearchHit};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearch {
    api_key: String,
    base_url: String,
    max_results: usize,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, max_results: usize, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            api_key: api_key.into(),
            base_url: TAVILY_URL.into(),
            max_results: max_results.clamp(1, 10),
            client,
        }
    }

    /// Point the backend at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
        })
    }

    fn parse_results(&self, body: TavilyResponse) -> Vec<SearchHit> {
        body.results
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                title: r.title,
                snippet: r.content,
                url: r.url,
            })
            .collect()
    }
}

#[async_trait]
impl EvidenceLookup for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::InvalidQuery("empty query".into()));
        }
        if self.api_key.is_empty() {
            return Err(LookupError::NotConfigured("TAVILY_API_KEY is not set".into()));
        }

        debug!(query, max_results = self.max_results, "Tavily search");

        let response = self
            .client
            .post(&self.base_url)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout(e.to_string())
                } else {
                    LookupError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let reason = response.text().await.unwrap_or_default();
            warn!(status, reason = %reason, "Tavily returned error");
            return Err(LookupError::ApiError {
                status_code: status,
                reason,
            });
        }

        let body: TavilyResponse = response.json().await.map_err(|e| LookupError::ApiError {
            status_code: 200,
            reason: format!("Failed to parse response: {e}"),
        })?;

        Ok(self.parse_results(body))
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(max: usize) -> TavilySearch {
        TavilySearch::new("tvly-test", max, Duration::from_secs(5))
    }

    #[test]
    fn request_body_shape() {
        let body = backend(5).request_body("rust async");
        assert_eq!(body["api_key"], "tvly-test");
        assert_eq!(body["query"], "rust async");
        assert_eq!(body["max_results"], 5);
    }

    #[test]
    fn max_results_clamped() {
        assert_eq!(backend(0).max_results, 1);
        assert_eq!(backend(99).max_results, 10);
    }

    #[test]
    fn parses_results_and_bounds_them() {
        let body: TavilyResponse = serde_json::from_value(serde_json::json!({
            "query": "q",
            "results": [
                {"title": "A", "url": "https://a", "content": "alpha", "score": 0.9},
                {"title": "B", "url": "https://b", "content": "beta", "score": 0.8},
                {"title": "C", "url": "https://c", "content": "gamma", "score": 0.7}
            ]
        }))
        .unwrap();

        let hits = backend(2).parse_results(body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "alpha");
        assert_eq!(hits[1].url, "https://b");
    }

    #[test]
    fn missing_results_field_is_empty() {
        let body: TavilyResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(backend(3).parse_results(body).is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let lookup = TavilySearch::new("", 3, Duration::from_secs(1));
        let err = lookup.search("q").await.unwrap_err();
        assert!(matches!(err, LookupError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let lookup = backend(3).with_base_url("http://127.0.0.1:9/search");
        let err = lookup.search("q").await.unwrap_err();
        assert!(matches!(err, LookupError::Network(_) | LookupError::Timeout(_)));
    }
}
