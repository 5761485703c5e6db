//! Command-line interface parsing for the news feed
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a `FeedConfig` plus the choice of remote sources.

use chrono::{Duration, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::app::Sources;
use crate::config::{
    FeedConfig, NamespaceConfig, DEFAULT_MAX_PAGE_SIZE, DEFAULT_MEMORY_COST_LIMIT_BYTES,
    DEFAULT_MEMORY_COUNT_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_RATE_LIMIT_COUNT,
    DEFAULT_RATE_LIMIT_WINDOW_SECS,
};
use crate::data::{MockSource, SortBy};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified sort order is not recognized
    #[error("{0}")]
    InvalidSort(String),

    /// The --from date could not be parsed
    #[error("Invalid date: '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    /// No API key was given and the mock source was not requested
    #[error("An API key is required: pass --api-key, set NEWS_API_KEY, or use --mock")]
    MissingApiKey,

    /// A namespace TTL was not given
    #[error("A cache TTL is required: pass {0}")]
    MissingTtl(&'static str),
}

/// Newsfeed - Search news with cached, rate-limited pagination
#[derive(Parser, Debug)]
#[command(name = "newsfeed")]
#[command(about = "Paginated news search with a two-tier cache")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// API key for the news service
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Use the built-in mock source instead of the network
    #[arg(long, global = true)]
    pub mock: bool,

    /// Directory for the durable cache (defaults to the XDG cache dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// How long result pages stay fresh, in seconds (required)
    #[arg(long, value_name = "SECS", env = "NEWSFEED_PAGE_TTL", global = true)]
    pub page_ttl: Option<u64>,

    /// How long assets stay fresh, in seconds (required)
    #[arg(long, value_name = "SECS", env = "NEWSFEED_ASSET_TTL", global = true)]
    pub asset_ttl: Option<u64>,

    /// Result pages kept in memory
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MEMORY_COUNT_LIMIT, global = true)]
    pub page_memory_limit: usize,

    /// Memory budget for cached result pages, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MEMORY_COST_LIMIT_BYTES, global = true)]
    pub page_memory_bytes: usize,

    /// Remote search calls allowed per rate window
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RATE_LIMIT_COUNT, global = true)]
    pub page_rate_limit: u32,

    /// Length of the search rate window, in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_RATE_LIMIT_WINDOW_SECS as u64, global = true)]
    pub page_rate_window: u64,

    /// Items requested per page
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    pub page_size: u32,

    /// Largest page size accepted
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PAGE_SIZE, global = true)]
    pub max_page_size: u32,

    /// Assets kept in memory
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MEMORY_COUNT_LIMIT, global = true)]
    pub asset_memory_limit: usize,

    /// Memory budget for cached assets, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MEMORY_COST_LIMIT_BYTES, global = true)]
    pub asset_memory_bytes: usize,

    /// Asset downloads allowed per rate window
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RATE_LIMIT_COUNT, global = true)]
    pub asset_rate_limit: u32,

    /// Length of the asset rate window, in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_RATE_LIMIT_WINDOW_SECS as u64, global = true)]
    pub asset_rate_window: u64,

    /// Only include items published on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", global = true)]
    pub from: Option<String>,

    /// Result ordering: published, relevancy, popularity
    #[arg(long, value_name = "ORDER", default_value = "published", global = true)]
    pub sort: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search and print results, page by page
    Search {
        /// Search text
        query: String,

        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Ignore cached pages and refetch from the source
        #[arg(long)]
        force_refresh: bool,

        /// Also fetch every result's image through the asset cache
        #[arg(long)]
        thumbnails: bool,
    },

    /// Load one asset through the asset cache and describe it
    Asset {
        /// Asset URL
        url: String,
    },

    /// Remove every cached page and asset
    ClearCache,
}

/// Configuration derived from CLI arguments for application startup
pub struct StartupConfig {
    pub feed: FeedConfig,
    pub sources: Sources,
}

/// Parses a `YYYY-MM-DD` date argument
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the feed config and selected sources
    /// * `Err(CliError)` if an argument is invalid or no API key is available
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let opts = &cli.options;
        let sort_by = opts.sort.parse::<SortBy>().map_err(CliError::InvalidSort)?;
        let from_date = opts.from.as_deref().map(parse_date_arg).transpose()?;

        let page_ttl = opts.page_ttl.ok_or(CliError::MissingTtl("--page-ttl"))?;
        let asset_ttl = opts.asset_ttl.ok_or(CliError::MissingTtl("--asset-ttl"))?;

        let pages = NamespaceConfig::new(seconds(page_ttl))
            .with_memory_limits(opts.page_memory_limit, opts.page_memory_bytes)
            .with_rate_limit(opts.page_rate_limit, seconds(opts.page_rate_window))
            .with_page_sizes(opts.page_size, opts.max_page_size);
        let assets = NamespaceConfig::new(seconds(asset_ttl))
            .with_memory_limits(opts.asset_memory_limit, opts.asset_memory_bytes)
            .with_rate_limit(opts.asset_rate_limit, seconds(opts.asset_rate_window));

        let mut feed = FeedConfig::new(pages, assets);
        feed.cache_dir = opts.cache_dir.clone();
        feed.from_date = from_date;
        feed.sort_by = sort_by;

        let sources = if opts.mock {
            Sources::mock(MockSource::new())
        } else {
            let key = opts.api_key.as_deref().filter(|k| !k.trim().is_empty());
            Sources::http(key.ok_or(CliError::MissingApiKey)?)
        };

        Ok(StartupConfig { feed, sources })
    }
}

/// Converts a second count, saturating at the largest representable duration
fn seconds(secs: u64) -> Duration {
    let max = (i64::MAX / 1_000) as u64;
    Duration::seconds(secs.min(max) as i64)
}
