//! Cache-aware, rate-limited page fetching
//!
//! A `FetchController` answers one `(query, page)` request at a time: it serves
//! fresh cached pages without touching the network, otherwise spends one
//! rate-limiter permit, calls the remote source, and caches non-empty results.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::data::{ResultPage, SortBy};
use crate::error::FetchError;
use crate::rate_limit::RateLimiter;
use crate::source::RemoteSource;

/// Query parameters applied to every request, plus page-size bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub from_date: Option<NaiveDate>,
    pub sort_by: SortBy,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Orchestrates cache lookup, rate limiting, and remote fetches for pages
pub struct FetchController {
    source: Arc<dyn RemoteSource>,
    cache: Arc<CacheStore<ResultPage>>,
    limiter: Arc<RateLimiter>,
    options: FetchOptions,
}

impl FetchController {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        cache: Arc<CacheStore<ResultPage>>,
        limiter: Arc<RateLimiter>,
        options: FetchOptions,
    ) -> Self {
        Self {
            source,
            cache,
            limiter,
            options,
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn cache(&self) -> &CacheStore<ResultPage> {
        &self.cache
    }

    /// Fetches one page of results
    ///
    /// # Arguments
    /// * `query` - Search text; must not be blank
    /// * `page` - 1-based page number
    /// * `page_size` - Items per page, between 1 and the configured maximum
    /// * `bypass_cache` - Skip the cache and drop every cached page whose key
    ///   contains `query` before calling the remote source
    ///
    /// # Returns
    /// * `Ok(ResultPage)` - Cached or freshly fetched page; may have no items
    /// * `Err(FetchError)` - Invalid parameters, rate limit, or remote failure
    pub async fn fetch(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
        bypass_cache: bool,
    ) -> Result<ResultPage, FetchError> {
        self.validate(query, page, page_size)?;
        let key = CacheKey::page(query, page);

        if bypass_cache {
            let removed = self.cache.invalidate_by_query_prefix(query).await;
            debug!(query, removed, "force refresh invalidated cached pages");
        } else if let Some(cached) = self.cache.get(&key).await {
            if cached.is_cacheable() {
                debug!(query, page, "serving page from cache");
                return Ok(cached);
            }
            self.cache.invalidate(&key).await;
        }

        self.limiter.check_and_consume().await?;

        let result = self
            .source
            .fetch_page(
                query,
                self.options.from_date,
                self.options.sort_by,
                page,
                page_size,
            )
            .await;

        match result {
            Ok(fetched) => {
                if fetched.is_cacheable() {
                    self.cache.put(&key, fetched.clone()).await;
                } else {
                    debug!(query, page, "empty page not cached");
                }
                Ok(fetched)
            }
            Err(err) => {
                warn!(query, page, error = %err, "remote fetch failed");
                Err(err)
            }
        }
    }

    /// Drops every cached page in both tiers
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn validate(&self, query: &str, page: u32, page_size: u32) -> Result<(), FetchError> {
        if query.trim().is_empty() {
            return Err(FetchError::InvalidRequest("query must not be empty".to_string()));
        }
        if page == 0 {
            return Err(FetchError::InvalidRequest("page numbers start at 1".to_string()));
        }
        if page_size == 0 || page_size > self.options.max_page_size {
            return Err(FetchError::InvalidRequest(format!(
                "page size {} outside 1..={}",
                page_size, self.options.max_page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachePolicy, Namespace};
    use crate::clock::{ManualClock, SharedClock};
    use crate::config::NamespaceConfig;
    use crate::data::MockSource;
    use chrono::Duration;
    use tempfile::TempDir;

    struct Harness {
        fetcher: FetchController,
        source: MockSource,
        clock: ManualClock,
        _dir: TempDir,
    }

    fn create_harness(rate_limit: u32) -> Harness {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::default();
        let shared: SharedClock = Arc::new(clock.clone());
        let config = NamespaceConfig::new(Duration::hours(1));
        let cache = Arc::new(CacheStore::new(
            Namespace::Pages,
            &config,
            dir.path(),
            CachePolicy {
                admit: ResultPage::is_cacheable,
                cost: ResultPage::cost,
            },
            shared.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new("pages", rate_limit, Duration::minutes(1), shared));
        let source = MockSource::new();
        let fetcher = FetchController::new(
            Arc::new(source.clone()),
            cache,
            limiter,
            FetchOptions {
                from_date: None,
                sort_by: SortBy::PublishedAt,
                default_page_size: 20,
                max_page_size: 100,
            },
        );
        Harness {
            fetcher,
            source,
            clock,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_remote_and_limiter() {
        let h = create_harness(1);

        let first = h.fetcher.fetch("Apple", 1, 20, false).await.unwrap();
        let second = h.fetcher.fetch("Apple", 1, 20, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.source.page_calls(), 1);
    }

    #[tokio::test]
    async fn test_bypass_cache_refetches_and_drops_other_pages() {
        let h = create_harness(10);
        h.fetcher.fetch("Apple", 1, 20, false).await.unwrap();
        h.fetcher.fetch("Apple", 2, 20, false).await.unwrap();

        h.fetcher.fetch("Apple", 1, 20, true).await.unwrap();

        assert_eq!(h.source.page_calls(), 3);
        let cache = h.fetcher.cache();
        assert!(cache.get(&CacheKey::page("Apple", 1)).await.is_some());
        assert!(cache.get(&CacheKey::page("Apple", 2)).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_result_is_returned_but_not_cached() {
        let h = create_harness(10);
        h.source.set_total("nothing", 0);

        let page = h.fetcher.fetch("nothing", 1, 20, false).await.unwrap();
        assert!(page.items.is_empty());
        h.fetcher.fetch("nothing", 1, 20, false).await.unwrap();

        assert_eq!(h.source.page_calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_call_never_reaches_source() {
        let h = create_harness(1);
        h.fetcher.fetch("Apple", 1, 20, false).await.unwrap();

        let err = h.fetcher.fetch("Banana", 1, 20, false).await.unwrap_err();

        assert_eq!(err, FetchError::RateLimited);
        assert_eq!(h.source.page_calls(), 1);

        h.clock.advance(Duration::minutes(2));
        assert!(h.fetcher.fetch("Banana", 1, 20, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_failures_propagate_and_are_not_cached() {
        let h = create_harness(10);
        h.source.fail_next(FetchError::ServerError { status: 503 });

        let err = h.fetcher.fetch("Apple", 1, 20, false).await.unwrap_err();

        assert_eq!(err, FetchError::ServerError { status: 503 });
        assert!(h.fetcher.cache().get(&CacheKey::page("Apple", 1)).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_rejected_before_limiter() {
        let h = create_harness(1);

        for (query, page, size) in [("  ", 1, 20), ("Apple", 0, 20), ("Apple", 1, 0), ("Apple", 1, 101)] {
            let err = h.fetcher.fetch(query, page, size, false).await.unwrap_err();
            assert!(matches!(err, FetchError::InvalidRequest(_)), "{query:?} {page} {size}");
        }

        assert_eq!(h.source.page_calls(), 0);
        assert!(h.fetcher.fetch("Apple", 1, 20, false).await.is_ok(), "Budget untouched");
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let h = create_harness(10);
        h.fetcher.fetch("Apple", 1, 20, false).await.unwrap();

        h.fetcher.clear_cache().await;
        h.fetcher.fetch("Apple", 1, 20, false).await.unwrap();

        assert_eq!(h.source.page_calls(), 2);
    }
}
