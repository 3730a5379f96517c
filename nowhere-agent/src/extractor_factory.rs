//! Resolves search-engine redirect URLs and dispatches to a site-specific
//! extractor by host, falling back to the generic one, per SPEC_FULL §4.3/§6.
use async_trait::async_trait;
use nowhere_social::reddit::RedditExtractor;
use nowhere_web::extract::GenericExtractor;
use nowhere_web::{ContentExtractor, ExtractError};
use url::Url;

pub struct ExtractorFactory {
    generic: GenericExtractor,
    reddit: RedditExtractor,
}

impl ExtractorFactory {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            generic: GenericExtractor::new()?,
            reddit: RedditExtractor::new()?,
        })
    }
}

#[async_trait]
impl ContentExtractor for ExtractorFactory {
    async fn extract_content(&self, url: &str) -> Result<String, ExtractError> {
        let resolved = resolve_redirect(url);
        if RedditExtractor::handles(&resolved) {
            self.reddit.extract_content(&resolved).await
        } else {
            self.generic.extract_content(&resolved).await
        }
    }
}

/// If `url`'s own host carries a `uddg` query parameter (the search
/// engine's redirect wrapper), replace it with the URL-decoded value of
/// that parameter. Idempotent: a URL with no `uddg` param passes through
/// unchanged, including one that was already unwrapped.
pub fn resolve_redirect(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    parsed
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_uddg_redirect_param() {
        let wrapped = "https://html.duckduckgo.com/html/?q=x&uddg=https%3A%2F%2Fexample.com%2Fpage";
        assert_eq!(resolve_redirect(wrapped), "https://example.com/page");
    }

    #[test]
    fn leaves_plain_urls_unchanged() {
        let plain = "https://example.com/page";
        assert_eq!(resolve_redirect(plain), plain);
    }

    #[test]
    fn redirect_unwrapping_is_idempotent() {
        let wrapped = "https://html.duckduckgo.com/html/?uddg=https%3A%2F%2Fexample.com%2Fpage";
        let once = resolve_redirect(wrapped);
        let twice = resolve_redirect(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn dispatches_reddit_hosts_by_name() {
        assert!(RedditExtractor::handles("https://www.reddit.com/r/rust/comments/abc/title/"));
        assert!(!RedditExtractor::handles("https://example.com/page"));
    }
}
