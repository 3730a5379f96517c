//! Web discovery and acquisition utilities.
//!
//! - `search`: HTML-scraping search provider (query-variation fan-out over a
//!   search engine's HTML results page)
//! - `json_api`: paginated JSON-API search provider, rate-limited
//! - `extract`: generic content extractor (strip boilerplate, prefer
//!   `<article>`/`<main>`/`<body>`)
//!
//! [`SearchProvider`] and [`ContentExtractor`] are the two capability
//! interfaces the research agent drives; this crate supplies the
//! general-purpose implementations, while `nowhere-social` supplies a
//! site-specific extractor for the same [`ContentExtractor`] trait.

pub mod extract;
pub mod json_api;
pub mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One hit from a search provider. Two results are equal iff their URLs are
/// equal, matching the data model's dedup-by-URL invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}
impl Eq for SearchResult {}

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("invalid query: must not be empty")]
    InvalidQuery,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("no results found")]
    NoResultsFound,
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned an error response: {0}")]
    BadServerResponse(String),
    #[error("cannot decode raw response body: {0}")]
    CannotDecodeRawData(String),
    #[error("cannot parse response content: {0}")]
    CannotParseResponse(String),
}

/// `search(query) → [SearchResult]`, per SPEC_FULL §4.2/§6.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// `extractContent(url) → string`, per SPEC_FULL §4.3/§6.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract_content(&self, url: &str) -> Result<String, ExtractError>;
}

/// Normalize a protocol-relative URL (`//host/path`) to an absolute `https://` one.
/// Absolute URLs are returned unchanged.
pub fn normalize_protocol_relative(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_results_compare_by_url_only() {
        let a = SearchResult {
            title: "A".into(),
            url: "https://example.com/x".into(),
            snippet: "one".into(),
        };
        let b = SearchResult {
            title: "B".into(),
            url: "https://example.com/x".into(),
            snippet: "two".into(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn normalizes_protocol_relative_urls() {
        assert_eq!(
            normalize_protocol_relative("//example.com/x"),
            "https://example.com/x"
        );
        assert_eq!(
            normalize_protocol_relative("https://example.com/x"),
            "https://example.com/x"
        );
    }
}
