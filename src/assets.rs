//! Asset loading with cache and cancel-on-supersede
//!
//! `AssetLoader` is the asset counterpart of `FetchController`: cache first,
//! then a rate-limited call to the `AssetSource`, caching only payloads that
//! decoded. `AssetView` tracks what one consumer (a thumbnail, a preview)
//! currently shows and guarantees a superseded load can never overwrite the
//! result of a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::data::Asset;
use crate::error::FetchError;
use crate::rate_limit::RateLimiter;
use crate::source::AssetSource;
use crate::task::{CancellableTask, TaskError, TaskSlot};

/// Loads assets through the asset cache
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    cache: Arc<CacheStore<Asset>>,
    limiter: Arc<RateLimiter>,
}

impl AssetLoader {
    pub fn new(
        source: Arc<dyn AssetSource>,
        cache: Arc<CacheStore<Asset>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            source,
            cache,
            limiter,
        }
    }

    pub fn cache(&self) -> &CacheStore<Asset> {
        &self.cache
    }

    /// Returns the asset at `url`, from cache when fresh
    pub async fn load(&self, url: &str) -> Result<Asset, FetchError> {
        if url.trim().is_empty() {
            return Err(FetchError::InvalidRequest("asset url must not be empty".to_string()));
        }
        let key = CacheKey::asset(url);

        if let Some(asset) = self.cache.get(&key).await {
            debug!(url, "serving asset from cache");
            return Ok(asset);
        }

        self.limiter.check_and_consume().await?;

        match self.source.fetch_asset(url).await {
            Ok(asset) => {
                self.cache.put(&key, asset.clone()).await;
                Ok(asset)
            }
            Err(err) => {
                warn!(url, error = %err, "asset fetch failed");
                Err(err)
            }
        }
    }

    /// Drops every cached asset in both tiers
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}

/// What an `AssetView` is showing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AssetPhase {
    #[default]
    Empty,
    Loading { url: String },
    Ready(Asset),
    Failed { url: String, error: FetchError },
}

#[derive(Debug, Default)]
struct ViewState {
    generation: u64,
    phase: AssetPhase,
}

/// Shows at most one asset, always the most recently requested one
pub struct AssetView {
    loader: Arc<AssetLoader>,
    state: Arc<Mutex<ViewState>>,
    slot: TaskSlot<()>,
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AssetView {
    pub fn new(loader: Arc<AssetLoader>) -> Self {
        Self {
            loader,
            state: Arc::new(Mutex::new(ViewState::default())),
            slot: TaskSlot::new(),
        }
    }

    /// Starts loading `url`, cancelling any load still in flight
    ///
    /// Each request gets a generation number; a completed load only publishes
    /// its result if no newer request has been made since.
    pub fn show(&mut self, url: &str) {
        self.slot.cancel();

        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.phase = AssetPhase::Loading {
                url: url.to_string(),
            };
            state.generation
        };

        let loader = Arc::clone(&self.loader);
        let state = Arc::clone(&self.state);
        let url = url.to_string();
        self.slot.replace(CancellableTask::spawn(async move {
            let result = loader.load(&url).await;
            let phase = match result {
                Ok(asset) => AssetPhase::Ready(asset),
                Err(error) => AssetPhase::Failed { url, error },
            };
            let mut state = lock(&state);
            if state.generation == generation {
                state.phase = phase;
            }
        }));
    }

    /// Cancels the in-flight load and clears the view
    pub fn cancel(&mut self) {
        self.slot.cancel();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.phase = AssetPhase::Empty;
    }

    /// Waits for the in-flight load, if any, to publish its result
    pub async fn settle(&mut self) -> Result<(), TaskError> {
        match self.slot.take() {
            Some(task) => task.join().await,
            None => Ok(()),
        }
    }

    pub fn phase(&self) -> AssetPhase {
        lock(&self.state).phase.clone()
    }
}
