//! Application wiring for the news feed
//!
//! `App` is the composition root: it validates the configuration, builds one
//! cache store and one rate limiter per namespace, and hands them to the
//! controllers. Which remote implementation is used is decided here, once,
//! through the `Sources` passed in.

use std::sync::Arc;
use tracing::info;

use crate::assets::{AssetLoader, AssetView};
use crate::cache::{CachePolicy, CacheStore, Namespace};
use crate::clock::{SharedClock, SystemClock};
use crate::config::FeedConfig;
use crate::data::{Asset, HttpAssetSource, MockSource, NewsApiClient, ResultPage};
use crate::error::ConfigError;
use crate::fetch::{FetchController, FetchOptions};
use crate::pagination::PaginationController;
use crate::rate_limit::RateLimiter;
use crate::source::{AssetSource, RemoteSource};

/// The remote collaborators the app talks to
#[derive(Clone)]
pub struct Sources {
    pub pages: Arc<dyn RemoteSource>,
    pub assets: Arc<dyn AssetSource>,
}

impl Sources {
    /// HTTP clients for the real services
    pub fn http(api_key: impl Into<String>) -> Self {
        Self {
            pages: Arc::new(NewsApiClient::new(api_key)),
            assets: Arc::new(HttpAssetSource::new()),
        }
    }

    /// One in-process mock serving both pages and assets
    pub fn mock(source: MockSource) -> Self {
        Self {
            pages: Arc::new(source.clone()),
            assets: Arc::new(source),
        }
    }
}

/// Shared services for every pagination context
pub struct App {
    fetcher: Arc<FetchController>,
    assets: Arc<AssetLoader>,
}

impl App {
    /// Builds the app on the system clock
    pub fn build(config: &FeedConfig, sources: Sources) -> Result<Self, ConfigError> {
        Self::build_with_clock(config, sources, Arc::new(SystemClock))
    }

    /// Builds the app on a caller-supplied clock
    pub fn build_with_clock(
        config: &FeedConfig,
        sources: Sources,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let root = config.resolve_cache_dir()?;
        info!(cache_dir = %root.display(), "initializing feed");

        let page_cache = Arc::new(CacheStore::new(
            Namespace::Pages,
            &config.pages,
            &root,
            CachePolicy {
                admit: ResultPage::is_cacheable,
                cost: ResultPage::cost,
            },
            clock.clone(),
        ));
        let page_limiter = Arc::new(RateLimiter::new(
            "pages",
            config.pages.rate_limit_count,
            config.pages.rate_limit_window,
            clock.clone(),
        ));
        let fetcher = Arc::new(FetchController::new(
            sources.pages,
            page_cache,
            page_limiter,
            FetchOptions {
                from_date: config.from_date,
                sort_by: config.sort_by,
                default_page_size: config.pages.default_page_size,
                max_page_size: config.pages.max_page_size,
            },
        ));

        let asset_cache = Arc::new(CacheStore::new(
            Namespace::Assets,
            &config.assets,
            &root,
            CachePolicy {
                admit: Asset::is_cacheable,
                cost: Asset::cost,
            },
            clock.clone(),
        ));
        let asset_limiter = Arc::new(RateLimiter::new(
            "assets",
            config.assets.rate_limit_count,
            config.assets.rate_limit_window,
            clock,
        ));
        let assets = Arc::new(AssetLoader::new(sources.assets, asset_cache, asset_limiter));

        Ok(Self { fetcher, assets })
    }

    /// A new pagination context sharing this app's cache and limiter
    pub fn paginator(&self) -> PaginationController {
        PaginationController::new(Arc::clone(&self.fetcher))
    }

    /// A new asset view sharing this app's asset cache and limiter
    pub fn asset_view(&self) -> AssetView {
        AssetView::new(Arc::clone(&self.assets))
    }

    pub fn fetcher(&self) -> &Arc<FetchController> {
        &self.fetcher
    }

    pub fn assets(&self) -> &Arc<AssetLoader> {
        &self.assets
    }

    /// Clears both namespaces in both tiers
    pub async fn clear_cache(&self) {
        self.fetcher.clear_cache().await;
        self.assets.clear_cache().await;
        info!("cache cleared");
    }
}
