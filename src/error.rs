//! Error types shared across the fetch path
//!
//! A successful response with zero results is never an error; it arrives as an
//! `Ok(ResultPage)` with empty `items`.

use thiserror::Error;

/// Failures surfaced by fetch operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The query or page parameters were malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The rate limiter rejected the call before it was attempted
    #[error("Rate limit reached, try again later")]
    RateLimited,

    /// Transport failure talking to the remote source
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed into the expected schema
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The remote source returned a structured error
    #[error("Upstream error {code}: {message}")]
    Upstream { code: String, message: String },

    /// The remote source failed with a 5xx-equivalent status
    #[error("Server error (status {status})")]
    ServerError { status: u16 },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status().filter(|s| s.is_server_error()) {
            FetchError::ServerError {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A limit that must be positive was zero
    #[error("{namespace}: {field} must be greater than zero")]
    ZeroValue {
        namespace: &'static str,
        field: &'static str,
    },

    /// Default page size exceeds the maximum page size
    #[error("{namespace}: default page size {default} exceeds max page size {max}")]
    PageSizeOutOfRange {
        namespace: &'static str,
        default: u32,
        max: u32,
    },

    /// The cache directory could not be determined
    #[error("Could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,
}
