//! Tavily web search backend.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::search::SearchProvider;
use crate::types::SearchHit;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Search provider backed by the Tavily `/search` endpoint.
pub struct TavilySearch {
    client: Client,
    base_url: String,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config
            .resolve_api_key()
            .map_err(|e| SearchError::AuthFailed {
                provider: format!("Tavily: {e}"),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::Request {
                query: String::new(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            max_results: config.max_results,
        })
    }

    fn build_request_body(&self, query: &str) -> Value {
        json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
            "search_depth": "basic",
        })
    }

    /// Read `results[]` into hits; entries missing every field are skipped.
    fn parse_response(body: &Value) -> Result<Vec<SearchHit>, SearchError> {
        let results = body
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| SearchError::ResponseParse {
                message: "Missing 'results' array in response".to_string(),
            })?;

        let field = |item: &Value, key: &str| {
            item.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        Ok(results
            .iter()
            .map(|item| SearchHit::new(field(item, "url"), field(item, "title"), field(item, "content")))
            .filter(|hit| !(hit.url.is_empty() && hit.title.is_empty() && hit.content.is_empty()))
            .collect())
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(query = %query, "Sending Tavily search request");

        let response = self
            .client
            .post(&url)
            .json(&self.build_request_body(query))
            .send()
            .await
            .map_err(|e| SearchError::Request {
                query: query.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SearchError::AuthFailed {
                provider: "Tavily".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Request {
                query: query.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::ResponseParse {
                message: format!("Failed to parse search response: {e}"),
            })?;

        Self::parse_response(&body)
    }
}
