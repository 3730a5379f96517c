//! Paginated JSON-API search provider, rate-limited to a configured rpm.
use crate::{SearchError, SearchProvider, SearchResult};
use async_trait::async_trait;
use nowhere_actors::actor::{spawn_actor, Addr};
use nowhere_actors::rate::{RateKey, RateLimiter, RateMsg};
use nowhere_http::{Auth, HttpClient, RequestOpts};
use serde::Deserialize;
use std::borrow::Cow;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;

const PAGE_SIZE: u32 = 10;
const MAX_PAGES: u32 = 6;
const MAX_RESULTS: usize = 60;
const INTER_PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize, Default)]
struct JsonApiPage {
    #[serde(default)]
    results: Vec<JsonApiResult>,
}

#[derive(Debug, Deserialize)]
struct JsonApiResult {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

pub struct JsonApiSearchProvider {
    http: HttpClient,
    api_key: String,
    rate: Addr<RateLimiter>,
    rate_key: RateKey,
}

impl JsonApiSearchProvider {
    /// `rpm` configures a dedicated rate limiter actor at construction time;
    /// per SPEC_FULL §4.2 this provider always wraps its own limiter at 60 rpm
    /// by default, but the ceiling is taken from configuration.
    pub async fn new(base_url: &str, api_key: String, rpm: u32) -> Result<Self, SearchError> {
        let http =
            HttpClient::new(base_url).map_err(|e| SearchError::InvalidUrl(e.to_string()))?;
        let handle = spawn_actor(RateLimiter::new(), 16);
        let rate_key = RateKey("json_api_search".into());
        handle
            .addr
            .send(RateMsg::Upsert {
                key: rate_key.clone(),
                rpm,
            })
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            rate: handle.addr,
            rate_key,
        })
    }

    async fn wait_for_slot(&self) -> Result<(), SearchError> {
        let (tx, rx) = oneshot::channel();
        self.rate
            .send(RateMsg::Acquire {
                key: self.rate_key.clone(),
                reply: tx,
            })
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        rx.await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        Ok(())
    }

    async fn fetch_page(&self, query: &str, page: u32) -> Result<JsonApiPage, SearchError> {
        self.wait_for_slot().await?;

        let count = PAGE_SIZE.to_string();
        let offset = (page * PAGE_SIZE).to_string();
        self.http
            .get_json(
                "search",
                RequestOpts {
                    auth: Some(Auth::Header {
                        name: reqwest::header::HeaderName::from_static("x-api-key"),
                        value: reqwest::header::HeaderValue::from_str(&self.api_key)
                            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?,
                    }),
                    query: Some(vec![
                        ("q", Cow::Borrowed(query)),
                        ("count", Cow::Owned(count)),
                        ("offset", Cow::Owned(offset)),
                    ]),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SearchProvider for JsonApiSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        let mut results = Vec::new();

        for page in 0..MAX_PAGES {
            if page > 0 {
                sleep(INTER_PAGE_DELAY).await;
            }

            let fetched = self.fetch_page(query, page).await?;
            if fetched.results.is_empty() {
                break;
            }

            results.extend(fetched.results.into_iter().map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.snippet,
            }));

            if results.len() >= MAX_RESULTS {
                break;
            }
        }

        Ok(results)
    }
}
