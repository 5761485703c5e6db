//! Tunables for each cache namespace and for the feed as a whole
//!
//! TTL has no default: the deployment picks it explicitly when building a
//! `NamespaceConfig`. Every other knob has a conservative default and can be
//! overridden with the `with_*` methods.

use chrono::{Duration, NaiveDate};
use directories::ProjectDirs;
use std::path::PathBuf;

use crate::data::SortBy;
use crate::error::ConfigError;

/// Default number of entries kept in the memory tier
pub const DEFAULT_MEMORY_COUNT_LIMIT: usize = 100;

/// Default aggregate byte cost kept in the memory tier (50 MiB)
pub const DEFAULT_MEMORY_COST_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Default number of remote calls allowed per rate window
pub const DEFAULT_RATE_LIMIT_COUNT: u32 = 100;

/// Default rate window length in seconds (one day)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: i64 = 86_400;

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the remote source accepts
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Limits and TTL for one cache namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Maximum number of entries held in memory
    pub memory_count_limit: usize,
    /// Maximum aggregate cost (bytes) held in memory
    pub memory_cost_limit_bytes: usize,
    /// How long an entry is served after it was created
    pub ttl: Duration,
    /// Remote calls permitted per window
    pub rate_limit_count: u32,
    /// Length of the fixed rate window
    pub rate_limit_window: Duration,
    /// Page size used when the caller does not pick one
    pub default_page_size: u32,
    /// Upper bound on requested page sizes
    pub max_page_size: u32,
}

impl NamespaceConfig {
    /// Creates a config with the given TTL and default limits
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory_count_limit: DEFAULT_MEMORY_COUNT_LIMIT,
            memory_cost_limit_bytes: DEFAULT_MEMORY_COST_LIMIT_BYTES,
            ttl,
            rate_limit_count: DEFAULT_RATE_LIMIT_COUNT,
            rate_limit_window: Duration::seconds(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_memory_limits(mut self, count: usize, cost_bytes: usize) -> Self {
        self.memory_count_limit = count;
        self.memory_cost_limit_bytes = cost_bytes;
        self
    }

    pub fn with_rate_limit(mut self, count: u32, window: Duration) -> Self {
        self.rate_limit_count = count;
        self.rate_limit_window = window;
        self
    }

    pub fn with_page_sizes(mut self, default: u32, max: u32) -> Self {
        self.default_page_size = default;
        self.max_page_size = max;
        self
    }

    /// Checks that every limit is usable
    ///
    /// # Arguments
    /// * `namespace` - Name used in error messages
    pub fn validate(&self, namespace: &'static str) -> Result<(), ConfigError> {
        let zero = |field| ConfigError::ZeroValue { namespace, field };

        if self.memory_count_limit == 0 {
            return Err(zero("memory_count_limit"));
        }
        if self.memory_cost_limit_bytes == 0 {
            return Err(zero("memory_cost_limit_bytes"));
        }
        if self.ttl <= Duration::zero() {
            return Err(zero("ttl"));
        }
        if self.rate_limit_count == 0 {
            return Err(zero("rate_limit_count"));
        }
        if self.rate_limit_window <= Duration::zero() {
            return Err(zero("rate_limit_window"));
        }
        if self.default_page_size == 0 {
            return Err(zero("default_page_size"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::PageSizeOutOfRange {
                namespace,
                default: self.default_page_size,
                max: self.max_page_size,
            });
        }
        Ok(())
    }
}

/// Configuration for the whole feed: both namespaces plus query defaults
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Result-page namespace
    pub pages: NamespaceConfig,
    /// Binary asset namespace
    pub assets: NamespaceConfig,
    /// Root of the durable tier; `None` means the XDG cache directory
    pub cache_dir: Option<PathBuf>,
    /// Only return items published on or after this date
    pub from_date: Option<NaiveDate>,
    /// Ordering requested from the remote source
    pub sort_by: SortBy,
}

impl FeedConfig {
    /// Creates a feed config with the given namespace configs and defaults elsewhere
    pub fn new(pages: NamespaceConfig, assets: NamespaceConfig) -> Self {
        Self {
            pages,
            assets,
            cache_dir: None,
            from_date: None,
            sort_by: SortBy::default(),
        }
    }

    /// Validates both namespaces
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pages.validate("pages")?;
        self.assets.validate("assets")
    }

    /// Resolves the durable cache root
    ///
    /// Uses `cache_dir` when set, otherwise `~/.cache/newsfeed/` on Linux or the
    /// platform equivalent.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        ProjectDirs::from("", "", "newsfeed")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .ok_or(ConfigError::NoCacheDir)
    }
}
