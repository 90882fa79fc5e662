//! Web search via the DuckDuckGo Instant Answer API.
//!
//! The provider answers with an optional abstract plus a list of related topics, some of which
//! are nested topic groups. [`reshape_answer`] flattens that into at most six display results.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Instant Answer endpoint.
pub const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";
/// Maximum number of related-topic results emitted after the summary.
pub const MAX_RELATED_TOPICS: usize = 5;
/// Title given to the abstract result.
pub const SUMMARY_TITLE: &str = "Summary";

/// A single search hit returned to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Display title.
    pub title: String,
    /// Short descriptive text.
    pub snippet: String,
    /// Link target (empty when the provider gave none).
    pub url: String,
}

/// Errors surfaced by search providers.
#[derive(Debug, Error)]
pub enum SearchClientError {
    /// Transport failed before a response arrived (includes timeouts).
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("search provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body, as text.
        body: String,
    },
    /// Provider body could not be decoded.
    #[error("malformed search response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by keyword search providers.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a single search for `query` and return results in display order.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchClientError>;
}

/// Structured Instant Answer payload. Only the fields we render are decoded.
#[derive(Debug, Default, Deserialize)]
pub struct InstantAnswer {
    /// Abstract text for the query, often empty.
    #[serde(rename = "AbstractText", default)]
    pub abstract_text: Option<String>,
    /// Source URL of the abstract.
    #[serde(rename = "AbstractURL", default)]
    pub abstract_url: Option<String>,
    /// Related topics in provider order.
    #[serde(rename = "RelatedTopics", default)]
    pub related_topics: Vec<RelatedTopic>,
}

/// Entry of the `RelatedTopics` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RelatedTopic {
    /// Named group of further topics; never rendered.
    Group {
        /// Group heading.
        #[serde(rename = "Name", default)]
        name: String,
        /// Nested topics.
        #[serde(rename = "Topics")]
        topics: Vec<serde_json::Value>,
    },
    /// Simple topic record.
    Topic {
        /// Topic description.
        #[serde(rename = "Text", default)]
        text: Option<String>,
        /// Link to the topic.
        #[serde(rename = "FirstURL", default)]
        first_url: Option<String>,
    },
    /// Anything else the provider may add; never rendered.
    Other(serde_json::Value),
}

/// Flatten an Instant Answer into display results.
///
/// The abstract (when it has text) comes first, followed by up to [`MAX_RELATED_TOPICS`]
/// simple topics that carry both text and a URL.
pub fn reshape_answer(answer: InstantAnswer) -> Vec<SearchResult> {
    let mut results = Vec::with_capacity(1 + MAX_RELATED_TOPICS);

    if let Some(abstract_text) = answer.abstract_text.filter(|text| !text.is_empty()) {
        results.push(SearchResult {
            title: SUMMARY_TITLE.to_string(),
            snippet: abstract_text,
            url: answer.abstract_url.unwrap_or_default(),
        });
    }

    let related = answer
        .related_topics
        .into_iter()
        .filter_map(|topic| match topic {
            RelatedTopic::Topic {
                text: Some(text),
                first_url: Some(url),
            } if !text.is_empty() && !url.is_empty() => Some(SearchResult {
                title: text.clone(),
                snippet: text,
                url,
            }),
            _ => None,
        })
        .take(MAX_RELATED_TOPICS);
    results.extend(related);

    results
}

/// Search client backed by DuckDuckGo's Instant Answer API.
pub struct DuckDuckGoClient {
    http: Client,
    endpoint: String,
}

impl DuckDuckGoClient {
    /// Build a client for the public endpoint with a bounded request timeout.
    pub fn new(timeout: Duration) -> Result<Self, SearchClientError> {
        Self::with_endpoint(DUCKDUCKGO_URL, timeout)
    }

    /// Build a client targeting an alternative endpoint.
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchClientError> {
        let http = Client::builder()
            .user_agent("research-relay/search")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchClientError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchClientError::UnexpectedStatus { status, body });
        }

        // The provider labels its JSON as `application/x-javascript`; decode the text directly.
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|error| SearchClientError::InvalidResponse(error.to_string()))?;

        let results = reshape_answer(answer);
        tracing::debug!(query, results = results.len(), "Search completed");
        Ok(results)
    }
}
