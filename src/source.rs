//! Remote collaborators consumed by the fetch path
//!
//! The HTTP clients and the in-process mock both implement these traits; which
//! one is used is decided once, when the `App` is built.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::{Asset, ResultPage, SortBy};
use crate::error::FetchError;

/// A paginated search backend
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetches one page of results
    ///
    /// Implementations do not retry; a failure is returned as-is.
    async fn fetch_page(
        &self,
        query: &str,
        from_date: Option<NaiveDate>,
        sort_by: SortBy,
        page: u32,
        page_size: u32,
    ) -> Result<ResultPage, FetchError>;
}

/// A source of binary assets addressed by URL
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetches and decodes the asset at `url`
    async fn fetch_asset(&self, url: &str) -> Result<Asset, FetchError>;
}
