//! Newsfeed Library
//!
//! Paginated news search backed by a two-tier TTL cache and a fixed-window
//! request-rate limiter. The binary in `main.rs` is a thin CLI over these
//! modules; integration tests drive them directly.

pub mod app;
pub mod assets;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod pagination;
pub mod rate_limit;
pub mod source;
pub mod task;
