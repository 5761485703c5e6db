//! Accumulated, paginated result sets
//!
//! A `PaginationController` owns the growing list of items for one query
//! context. At most one fetch runs per controller; calls that arrive while a
//! fetch is in flight are dropped rather than queued, so pages are always
//! appended in request order.
//!
//! Each load runs as its own tokio task that fetches and merges. A caller that
//! stops waiting (a `select!` branch, a timeout) does not interrupt it, so the
//! controller always leaves `Loading`.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::data::{Article, ResultPage};
use crate::error::FetchError;
use crate::fetch::FetchController;

/// Lifecycle of the controller's current load
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaginationStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored(FetchError),
}

/// Read-only view of the accumulated results
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaginationState {
    /// Query the items belong to
    pub query: String,
    /// Last page successfully merged; 0 before the first load
    pub current_page: u32,
    /// Items across every loaded page, in page order
    pub items: Vec<Article>,
    /// Total the remote source reports for the query
    pub total_available: u64,
    /// Whether another page can be requested
    pub has_more: bool,
    pub status: PaginationStatus,
}

impl PaginationState {
    fn recompute_has_more(&mut self) {
        self.has_more = (self.items.len() as u64) < self.total_available;
    }
}

/// What a pagination call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was fetched: a load was in flight or there is nothing more
    Skipped,
    /// A page was fetched and merged
    Loaded,
    /// The fetch failed; previous items were kept
    Failed(FetchError),
}

/// How a fetched page is merged into the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Replace,
    Append,
}

/// Drives first/next/refresh loads for one query context
pub struct PaginationController {
    fetcher: Arc<FetchController>,
    page_size: u32,
    state: Arc<Mutex<PaginationState>>,
}

impl PaginationController {
    /// Creates a controller using the fetcher's default page size
    pub fn new(fetcher: Arc<FetchController>) -> Self {
        let page_size = fetcher.options().default_page_size;
        Self::with_page_size(fetcher, page_size)
    }

    pub fn with_page_size(fetcher: Arc<FetchController>, page_size: u32) -> Self {
        Self {
            fetcher,
            page_size,
            state: Arc::new(Mutex::new(PaginationState::default())),
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> PaginationState {
        self.state.lock().await.clone()
    }

    /// Loads page 1 of `query`, serving it from cache when fresh
    pub async fn load_first(&self, query: &str) -> LoadOutcome {
        self.load_from_start(query, false).await
    }

    /// Same as `load_first`
    pub async fn refresh(&self, query: &str) -> LoadOutcome {
        self.load_from_start(query, false).await
    }

    /// Reloads page 1 of `query` from the remote source, dropping cached pages
    pub async fn force_refresh(&self, query: &str) -> LoadOutcome {
        self.load_from_start(query, true).await
    }

    /// Loads the page after the last one merged
    ///
    /// Skipped unless the previous load succeeded far enough to know there is
    /// more and no load is in flight.
    pub async fn load_next(&self) -> LoadOutcome {
        let (query, page) = {
            let mut state = self.state.lock().await;
            if state.status == PaginationStatus::Loading || !state.has_more {
                debug!(query = %state.query, "load_next skipped");
                return LoadOutcome::Skipped;
            }
            state.status = PaginationStatus::Loading;
            (state.query.clone(), state.current_page + 1)
        };

        self.run_load(query, page, false, Merge::Append).await
    }

    /// Drops every cached page, leaving the accumulated items untouched
    pub async fn clear_cache(&self) {
        self.fetcher.clear_cache().await;
    }

    async fn load_from_start(&self, query: &str, bypass_cache: bool) -> LoadOutcome {
        {
            let mut state = self.state.lock().await;
            if state.status == PaginationStatus::Loading {
                debug!(query, "load skipped, fetch already in flight");
                return LoadOutcome::Skipped;
            }
            if state.query != query {
                *state = PaginationState {
                    query: query.to_string(),
                    ..PaginationState::default()
                };
            }
            state.status = PaginationStatus::Loading;
        }

        self.run_load(query.to_string(), 1, bypass_cache, Merge::Replace).await
    }

    /// Fetches `page` and merges it on a detached task, then waits for it
    async fn run_load(&self, query: String, page: u32, bypass_cache: bool, merge: Merge) -> LoadOutcome {
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let page_size = self.page_size;

        let load = tokio::spawn(async move {
            let result = fetcher.fetch(&query, page, page_size, bypass_cache).await;
            apply(&state, result, merge).await
        });

        match load.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                // Only runtime shutdown cancels a load task
                let mut state = self.state.lock().await;
                state.status = PaginationStatus::Idle;
                LoadOutcome::Skipped
            }
        }
    }
}

/// Merges a fetch result into `state` and leaves `Loading`
async fn apply(
    state: &Mutex<PaginationState>,
    result: Result<ResultPage, FetchError>,
    merge: Merge,
) -> LoadOutcome {
    let mut state = state.lock().await;
    match result {
        Ok(page) => {
            let empty = page.items.is_empty();
            match merge {
                Merge::Replace => state.items = page.items,
                Merge::Append => state.items.extend(page.items),
            }
            state.current_page = page.page;
            state.total_available = page.total_available;
            if merge == Merge::Append && empty {
                // The source ran dry before its reported total
                state.total_available = state.items.len() as u64;
            }
            state.recompute_has_more();
            state.status = PaginationStatus::Loaded;
            debug!(
                query = %state.query,
                page = state.current_page,
                items = state.items.len(),
                has_more = state.has_more,
                "page merged"
            );
            LoadOutcome::Loaded
        }
        Err(err) => {
            debug!(query = %state.query, error = %err, "load failed, keeping previous items");
            state.status = PaginationStatus::Errored(err.clone());
            LoadOutcome::Failed(err)
        }
    }
}
