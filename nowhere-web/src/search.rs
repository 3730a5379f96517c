//! HTML-scraping search provider: query-variation fan-out over a search
//! engine's HTML results page (no API key required).
use crate::{normalize_protocol_relative, SearchError, SearchProvider, SearchResult};
use async_trait::async_trait;
use nowhere_http::{HttpClient, RequestOpts};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::sleep;

const INTER_QUERY_DELAY: Duration = Duration::from_secs(1);

/// Settings mirrored from `nowhere_config::HtmlProviderSettings` so this
/// crate doesn't need to depend on the config crate directly.
#[derive(Debug, Clone)]
pub struct HtmlSearchSettings {
    pub engine_base_url: String,
    pub variations: Vec<String>,
}

pub struct HtmlSearchProvider {
    http: HttpClient,
    variations: Vec<String>,
}

impl HtmlSearchProvider {
    pub fn new(settings: HtmlSearchSettings) -> Result<Self, SearchError> {
        let http = HttpClient::new(&settings.engine_base_url)
            .map_err(|e| SearchError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http,
            variations: settings.variations,
        })
    }

    /// The raw query plus each configured topic-broadening suffix, e.g.
    /// `["rust ownership", "rust ownership overview", "rust ownership guide"]`.
    fn query_variations(&self, query: &str) -> Vec<String> {
        let mut out = vec![query.to_string()];
        out.extend(self.variations.iter().map(|suffix| format!("{query} {suffix}")));
        out
    }

    async fn fetch_one(&self, q: &str) -> Result<Vec<SearchResult>, SearchError> {
        let body = self
            .http
            .get_text(
                "",
                RequestOpts {
                    query: Some(vec![("q", Cow::Borrowed(q))]),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(parse_results(&body))
    }
}

#[async_trait]
impl SearchProvider for HtmlSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        let variations = self.query_variations(query);
        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::new();

        for (i, variation) in variations.iter().enumerate() {
            if i > 0 {
                sleep(INTER_QUERY_DELAY).await;
            }

            match self.fetch_one(variation).await {
                Ok(page) => {
                    for r in page {
                        if seen.insert(r.url.clone()) {
                            results.push(r);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(variation = %variation, %err, "html_search.variation_failed");
                }
            }
        }

        Ok(results)
    }
}

/// Extracts anchor+snippet pairs via the engine's result-block markup
/// (`.result` wrapping `a.result__a` and `.result__snippet`).
fn parse_results(body: &str) -> Vec<SearchResult> {
    let doc = Html::parse_document(body);
    let result_sel = Selector::parse(".result").expect("static selector");
    let link_sel = Selector::parse("a.result__a").expect("static selector");
    let snippet_sel = Selector::parse(".result__snippet").expect("static selector");

    doc.select(&result_sel)
        .filter_map(|block| {
            let link = block.select(&link_sel).next()?;
            let url = link.value().attr("href")?;
            let title = link.text().collect::<String>().trim().to_string();
            let snippet = block
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            Some(SearchResult {
                title,
                url: normalize_protocol_relative(url),
                snippet,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_blocks() {
        let html = r#"
            <div class="result">
                <a class="result__a" href="//example.com/a">Example A</a>
                <a class="result__snippet">First snippet</a>
            </div>
            <div class="result">
                <a class="result__a" href="https://example.com/b">Example B</a>
                <a class="result__snippet">Second snippet</a>
            </div>
        "#;
        let results = parse_results(html);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://example.com/a");
        assert_eq!(results[0].title, "Example A");
        assert_eq!(results[0].snippet, "First snippet");
        assert_eq!(results[1].url, "https://example.com/b");
    }

    #[test]
    fn skips_blocks_missing_a_link() {
        let html = r#"<div class="result"><span>no link here</span></div>"#;
        assert!(parse_results(html).is_empty());
    }
}
