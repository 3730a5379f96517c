//! Fans a query out to every configured [`SearchProvider`] concurrently and
//! unions the results, preserving first-seen order, per SPEC_FULL §4.2.
use async_trait::async_trait;
use nowhere_web::{SearchError, SearchProvider, SearchResult};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

pub struct CompositeSearchProvider {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl CompositeSearchProvider {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl SearchProvider for CompositeSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        let mut joinset = JoinSet::new();
        for (idx, provider) in self.providers.iter().cloned().enumerate() {
            let query = query.to_string();
            joinset.spawn(async move { (idx, provider.search(&query).await) });
        }

        // Child results arrive out of spawn order; collect by index first so
        // the union below still prefers the first-configured provider's
        // results when two providers surface the same URL.
        let mut outcomes: Vec<Option<Result<Vec<SearchResult>, SearchError>>> =
            (0..self.providers.len()).map(|_| None).collect();
        while let Some(joined) = joinset.join_next().await {
            let (idx, result) = joined.expect("search task does not panic");
            outcomes[idx] = Some(result);
        }

        let mut seen = HashSet::new();
        let mut union = Vec::new();
        let mut all_failed = true;
        let mut first_error = None;

        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(results) => {
                    all_failed = false;
                    for r in results {
                        if seen.insert(r.url.clone()) {
                            union.push(r);
                        }
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if union.is_empty() && all_failed {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(union)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider {
        results: Vec<SearchResult>,
        fail: bool,
    }

    #[async_trait]
    impl SearchProvider for FakeProvider {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
            if self.fail {
                Err(SearchError::InvalidResponse("boom".into()))
            } else {
                Ok(self.results.clone())
            }
        }
    }

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: url.into(),
            url: url.into(),
            snippet: String::new(),
        }
    }

    #[tokio::test]
    async fn unions_and_dedupes_across_providers() {
        let a = Arc::new(FakeProvider {
            results: vec![result("https://a"), result("https://shared")],
            fail: false,
        });
        let b = Arc::new(FakeProvider {
            results: vec![result("https://shared"), result("https://b")],
            fail: false,
        });
        let composite = CompositeSearchProvider::new(vec![a, b]);
        let results = composite.search("q").await.unwrap();
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://shared", "https://b"]);
    }

    #[tokio::test]
    async fn fails_only_when_every_provider_fails() {
        let a = Arc::new(FakeProvider {
            results: vec![],
            fail: true,
        });
        let b = Arc::new(FakeProvider {
            results: vec![result("https://b")],
            fail: false,
        });
        let composite = CompositeSearchProvider::new(vec![a, b]);
        let results = composite.search("q").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn all_providers_failing_surfaces_the_first_error() {
        let a = Arc::new(FakeProvider {
            results: vec![],
            fail: true,
        });
        let composite = CompositeSearchProvider::new(vec![a]);
        assert!(composite.search("q").await.is_err());
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_fan_out() {
        let composite = CompositeSearchProvider::new(vec![]);
        assert!(matches!(
            composite.search("   ").await,
            Err(SearchError::InvalidQuery)
        ));
    }
}
