//! HTTP client for the Reddit-shaped listing API: thread/index GETs and the
//! "more children" comment-expansion POST.
use super::types::{CommentNode, Listing, PostData};
use nowhere_http::{HttpClient, RequestOpts};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

const CANONICAL_HOST: &str = "www.reddit.com";
const MAX_RETRY: u32 = 5;

#[derive(thiserror::Error, Debug)]
pub enum RedditError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("rate limited")]
    RateLimited,
}

/// Force `https`, the canonical host, a `.json` suffix, and (for comment
/// threads) `limit=1000`, per SPEC_FULL §4.3.
pub fn normalize_url(raw: &str) -> Result<String, RedditError> {
    let mut url = Url::parse(raw).map_err(|e| RedditError::InvalidUrl(e.to_string()))?;
    url.set_scheme("https")
        .map_err(|_| RedditError::InvalidUrl("cannot force https scheme".into()))?;
    url.set_host(Some(CANONICAL_HOST))
        .map_err(|e| RedditError::InvalidUrl(e.to_string()))?;

    let is_thread = url.path().contains("/comments/");
    let path = url.path().trim_end_matches('/');
    let path = if path.ends_with(".json") {
        path.to_string()
    } else {
        format!("{path}.json")
    };
    url.set_path(&path);

    if is_thread {
        url.query_pairs_mut().append_pair("limit", "1000");
    }

    Ok(url.to_string())
}

pub struct RedditApi {
    http: HttpClient,
}

impl RedditApi {
    pub fn new() -> Result<Self, RedditError> {
        let http = HttpClient::new("https://www.reddit.com/")
            .map_err(|e| RedditError::Request(e.to_string()))?;
        Ok(Self { http })
    }

    /// GET a normalized thread URL; Reddit returns `[postListing, commentListing]`.
    pub async fn fetch_thread(
        &self,
        url: &str,
    ) -> Result<(Listing<PostData>, Listing<Value>), RedditError> {
        self.http
            .get_json(url, RequestOpts { allow_absolute: true, ..Default::default() })
            .await
            .map_err(|e| RedditError::Request(e.to_string()))
    }

    /// GET a normalized index/listing URL (e.g. a subreddit front page).
    pub async fn fetch_index(&self, url: &str) -> Result<Listing<PostData>, RedditError> {
        self.http
            .get_json(url, RequestOpts { allow_absolute: true, ..Default::default() })
            .await
            .map_err(|e| RedditError::Request(e.to_string()))
    }

    /// POST one "more children" chunk (`ids.len() <= 100`). Returns the newly
    /// revealed comment nodes. Callers handle 429/backoff/retry policy.
    async fn fetch_more_children_once(
        &self,
        link_id: &str,
        ids: &[String],
        depth: i64,
    ) -> Result<Vec<CommentNode>, RedditError> {
        #[derive(serde::Serialize)]
        struct MoreChildrenRequest<'a> {
            api_type: &'a str,
            link_id: &'a str,
            children: String,
            sort: &'a str,
            limit_children: bool,
            depth: i64,
        }

        #[derive(Deserialize)]
        struct MoreChildrenResponse {
            json: MoreChildrenJson,
        }
        #[derive(Deserialize)]
        struct MoreChildrenJson {
            data: MoreChildrenData,
        }
        #[derive(Deserialize)]
        struct MoreChildrenData {
            #[serde(default)]
            things: Vec<CommentNode>,
        }

        let req = MoreChildrenRequest {
            api_type: "json",
            link_id,
            children: ids.join(","),
            sort: "top",
            limit_children: false,
            depth,
        };

        let resp: Result<MoreChildrenResponse, _> = self
            .http
            .post_json_opts(
                "api/morechildren.json",
                &req,
                RequestOpts {
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await;

        match resp {
            Ok(body) => Ok(body.json.data.things),
            Err(nowhere_http::HttpError::Api { status, .. })
                if status == StatusCode::TOO_MANY_REQUESTS =>
            {
                Err(RedditError::RateLimited)
            }
            Err(e) => Err(RedditError::Request(e.to_string())),
        }
    }

    /// Expand one chunk, honoring the 429-retry-once and exponential-backoff
    /// policy. Returns `None` (subtree abandoned, not fatal) if every attempt
    /// fails.
    pub async fn fetch_more_children(
        &self,
        link_id: &str,
        ids: &[String],
        depth: i64,
    ) -> Option<Vec<CommentNode>> {
        match self.fetch_more_children_once(link_id, ids, depth).await {
            Ok(v) => return Some(v),
            Err(RedditError::RateLimited) => {
                sleep(Duration::from_secs(1)).await;
                if let Ok(v) = self.fetch_more_children_once(link_id, ids, depth).await {
                    return Some(v);
                }
            }
            Err(_) => {}
        }

        for attempt in 0..MAX_RETRY {
            sleep(Duration::from_secs(2u64.pow(attempt))).await;
            if let Ok(v) = self.fetch_more_children_once(link_id, ids, depth).await {
                return Some(v);
            }
        }

        tracing::warn!(link_id, "reddit.more_children_abandoned_after_retries");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_host_and_json_suffix() {
        let out = normalize_url("http://reddit.com/r/rust/comments/abc123/title/").unwrap();
        assert!(out.starts_with("https://www.reddit.com/r/rust/comments/abc123/title.json"));
        assert!(out.contains("limit=1000"));
    }

    #[test]
    fn index_urls_get_no_limit_param() {
        let out = normalize_url("https://old.reddit.com/r/rust/").unwrap();
        assert!(out.starts_with("https://www.reddit.com/r/rust.json"));
        assert!(!out.contains("limit="));
    }

    #[test]
    fn already_json_suffixed_urls_are_not_doubled() {
        let out = normalize_url("https://www.reddit.com/r/rust.json").unwrap();
        assert_eq!(out.matches(".json").count(), 1);
    }
}
