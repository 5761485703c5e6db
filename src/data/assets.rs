//! HTTP asset source
//!
//! Downloads image payloads and validates them before they are handed to the
//! asset cache.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::Asset;
use crate::error::FetchError;
use crate::source::AssetSource;

/// Fetches assets over plain HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpAssetSource {
    client: Client,
}

impl HttpAssetSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Maps a non-success status onto the error taxonomy
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status.is_server_error() {
        Some(FetchError::ServerError {
            status: status.as_u16(),
        })
    } else {
        Some(FetchError::Upstream {
            code: status.as_u16().to_string(),
            message: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        })
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch_asset(&self, url: &str) -> Result<Asset, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| FetchError::InvalidRequest(format!("bad asset url {}: {}", url, e)))?;

        let response = self.client.get(parsed).send().await?;
        if let Some(err) = classify_status(response.status()) {
            return Err(err);
        }
        let bytes = response.bytes().await?;

        Asset::decode(url, bytes.to_vec())
    }
}
