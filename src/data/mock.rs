//! In-process source used for offline runs and tests
//!
//! Generates deterministic articles and tiny PNG assets, counts every call,
//! and can be scripted to fail or to respond slowly.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{Article, Asset, ResultPage, SortBy};
use crate::error::FetchError;
use crate::source::{AssetSource, RemoteSource};

/// Total results reported for queries without an explicit total
const DEFAULT_TOTAL: u64 = 57;

/// Smallest payload that sniffs as PNG
const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Default)]
struct MockState {
    totals: HashMap<String, u64>,
    failures: VecDeque<FetchError>,
    requests: Vec<(String, u32)>,
    latency: Duration,
}

/// Deterministic implementation of both source traits
///
/// Clones share counters and scripts, so a test can keep a handle after
/// passing the source into an `App`.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
    page_calls: Arc<AtomicUsize>,
    asset_calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the total result count reported for `query`
    pub fn set_total(&self, query: &str, total: u64) {
        self.state().totals.insert(query.to_string(), total);
    }

    /// Makes the next call (page or asset) fail with `err`
    pub fn fail_next(&self, err: FetchError) {
        self.state().failures.push_back(err);
    }

    /// Delays every response by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Number of `fetch_page` calls so far
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_asset` calls so far
    pub fn asset_calls(&self) -> usize {
        self.asset_calls.load(Ordering::SeqCst)
    }

    /// Every `(query, page)` requested, in call order
    pub fn requests(&self) -> Vec<(String, u32)> {
        self.state().requests.clone()
    }

    /// Builds the article at absolute position `index` for `query`
    pub fn article(query: &str, index: u64) -> Article {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single();
        Article {
            title: format!("{} story {}", query, index + 1),
            description: Some(format!("Mock coverage of {}", query)),
            url: format!("https://news.example/{}/{}", urlencoding::encode(query), index + 1),
            image_url: Some(format!("https://img.example/{}/{}.png", urlencoding::encode(query), index + 1)),
            source_name: Some("Mock Wire".to_string()),
            author: None,
            published_at: base.map(|t| t - ChronoDuration::minutes(index as i64)),
        }
    }

    /// Records a call and returns the scripted failure and latency for it
    fn begin_call(&self, request: Option<(String, u32)>) -> (Option<FetchError>, Duration) {
        let mut state = self.state();
        if let Some(request) = request {
            state.requests.push(request);
        }
        (state.failures.pop_front(), state.latency)
    }
}

#[async_trait]
impl RemoteSource for MockSource {
    async fn fetch_page(
        &self,
        query: &str,
        _from_date: Option<NaiveDate>,
        _sort_by: SortBy,
        page: u32,
        page_size: u32,
    ) -> Result<ResultPage, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let (failure, latency) = self.begin_call(Some((query.to_string(), page)));
        let total = self
            .state()
            .totals
            .get(query)
            .copied()
            .unwrap_or(DEFAULT_TOTAL);

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let start = u64::from(page.saturating_sub(1)) * u64::from(page_size);
        let end = (start + u64::from(page_size)).min(total);
        let items = (start..end).map(|i| Self::article(query, i)).collect();

        Ok(ResultPage {
            query: query.to_string(),
            page,
            items,
            total_available: total,
        })
    }
}

#[async_trait]
impl AssetSource for MockSource {
    async fn fetch_asset(&self, url: &str) -> Result<Asset, FetchError> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        let (failure, latency) = self.begin_call(None);

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let mut bytes = if url.contains("broken") {
            b"not an image".to_vec()
        } else {
            PNG_HEADER.to_vec()
        };
        bytes.extend_from_slice(url.as_bytes());
        Asset::decode(url, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AssetFormat;

    #[tokio::test]
    async fn test_pages_slice_the_total() {
        let source = MockSource::new();
        source.set_total("Apple", 45);

        let first = source
            .fetch_page("Apple", None, SortBy::PublishedAt, 1, 20)
            .await
            .unwrap();
        let last = source
            .fetch_page("Apple", None, SortBy::PublishedAt, 3, 20)
            .await
            .unwrap();
        let beyond = source
            .fetch_page("Apple", None, SortBy::PublishedAt, 4, 20)
            .await
            .unwrap();

        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[0].title, "Apple story 1");
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[4].title, "Apple story 45");
        assert!(beyond.items.is_empty());
        assert_eq!(source.page_calls(), 3);
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let source = MockSource::new();
        source.fail_next(FetchError::Network("offline".to_string()));

        let first = source.fetch_page("Apple", None, SortBy::Relevancy, 1, 10).await;
        let second = source.fetch_page("Apple", None, SortBy::Relevancy, 1, 10).await;

        assert_eq!(first.unwrap_err(), FetchError::Network("offline".to_string()));
        assert!(second.is_ok());
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_assets_decode_as_png_unless_broken() {
        let source = MockSource::new();

        let asset = source.fetch_asset("https://img.example/a.png").await.unwrap();
        assert_eq!(asset.format, AssetFormat::Png);

        let broken = source.fetch_asset("https://img.example/broken.png").await;
        assert!(matches!(broken, Err(FetchError::Decode(_))));
        assert_eq!(source.asset_calls(), 2);
    }
}
