//! Web search capability.
//!
//! [`WebSearch`] performs a single attempt per call; retries and timeouts
//! are applied by the caller through [`crate::retry`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};

use crate::core::SearchResult;
use crate::error::SearchError;

/// Tavily search endpoint.
pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Trait for web search backends.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Backend name (e.g. `"tavily"`).
    fn name(&self) -> &'static str;

    /// Returns at most `max_results` results for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] classified by retryability.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_raw_content: bool,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

impl From<TavilyHit> for SearchResult {
    fn from(hit: TavilyHit) -> Self {
        let raw_content = hit
            .raw_content
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(hit.content);
        Self {
            url: hit.url,
            title: hit.title,
            raw_content,
        }
    }
}

/// Tavily web search with extracted page content.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    /// Creates a client for the public Tavily endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_string(),
        }
    }

    /// Overrides the endpoint (proxies, tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Maps a non-success HTTP status onto a [`SearchError`].
    fn map_http_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> SearchError {
        let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
        if status == StatusCode::TOO_MANY_REQUESTS {
            SearchError::RateLimited {
                message,
                retry_after,
            }
        } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            SearchError::Transient { message }
        } else {
            SearchError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }

    fn map_transport_error(err: &reqwest::Error) -> SearchError {
        if err.is_builder() {
            SearchError::Rejected {
                status: 0,
                message: err.to_string(),
            }
        } else {
            SearchError::Transient {
                message: err.to_string(),
            }
        }
    }
}

/// Parses a `Retry-After` header given in seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let body = TavilyRequest {
            query,
            max_results,
            search_depth: "basic",
            include_raw_content: true,
            include_answer: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, retry_after, &text));
        }

        let parsed: TavilyResponse = response.json().await.map_err(|e| SearchError::Transient {
            message: format!("malformed search response: {e}"),
        })?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|hit| !hit.url.trim().is_empty())
            .take(max_results)
            .map(SearchResult::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_hit_prefers_raw_content() {
        let hit: TavilyHit = serde_json::from_str(
            r#"{"url": "https://a.example", "title": "A", "content": "snippet", "raw_content": "full page"}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(SearchResult::from(hit).raw_content, "full page");
    }

    #[test]
    fn test_hit_falls_back_to_snippet() {
        let hit: TavilyHit = serde_json::from_str(
            r#"{"url": "https://a.example", "content": "snippet", "raw_content": null}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        let result = SearchResult::from(hit);
        assert_eq!(result.raw_content, "snippet");
        assert!(result.title.is_empty());
    }

    #[test]
    fn test_rate_limit_keeps_hint() {
        let err = TavilySearch::map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            parse_retry_after(" 7 "),
            "slow down",
        );
        assert_eq!(
            err,
            SearchError::RateLimited {
                message: "HTTP 429: slow down".to_string(),
                retry_after: Some(Duration::from_secs(7)),
            }
        );
    }

    #[test_case(StatusCode::BAD_GATEWAY, true ; "bad gateway is transient")]
    #[test_case(StatusCode::SERVICE_UNAVAILABLE, true ; "unavailable is transient")]
    #[test_case(StatusCode::UNAUTHORIZED, false ; "unauthorized is rejected")]
    #[test_case(StatusCode::BAD_REQUEST, false ; "bad request is rejected")]
    fn test_status_classification(status: StatusCode, transient: bool) {
        let err = TavilySearch::map_http_error(status, None, "");
        assert_eq!(matches!(err, SearchError::Transient { .. }), transient);
    }

    #[test]
    fn test_parse_retry_after_ignores_dates() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }
}
