//! Core data models for the news feed
//!
//! This module contains the values that flow through the fetch path: articles,
//! result pages, binary assets, and the sort order requested from the remote
//! source. Concrete sources live in the submodules.

pub mod assets;
pub mod mock;
pub mod news;

pub use assets::HttpAssetSource;
pub use mock::MockSource;
pub use news::NewsApiClient;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// A single search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Headline
    pub title: String,
    /// Short summary, if the publisher provided one
    pub description: Option<String>,
    /// Link to the full article
    pub url: String,
    /// Link to the lead image, if any
    pub image_url: Option<String>,
    /// Publisher name
    pub source_name: Option<String>,
    /// Byline
    pub author: Option<String>,
    /// Publication time
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Approximate heap footprint in bytes, used for memory-tier accounting
    pub fn cost(&self) -> usize {
        let opt = |s: &Option<String>| s.as_ref().map_or(0, String::len);
        std::mem::size_of::<Self>()
            + self.title.len()
            + self.url.len()
            + opt(&self.description)
            + opt(&self.image_url)
            + opt(&self.source_name)
            + opt(&self.author)
    }
}

/// One page of results for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    /// The query text that produced this page
    pub query: String,
    /// 1-based page number
    pub page: u32,
    /// Results in the order the remote source returned them
    pub items: Vec<Article>,
    /// Total number of results the remote source reports for the query
    pub total_available: u64,
}

impl ResultPage {
    /// Zero-result pages are never cached
    pub fn is_cacheable(&self) -> bool {
        !self.items.is_empty()
    }

    /// Approximate heap footprint in bytes
    pub fn cost(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.query.len()
            + self.items.iter().map(Article::cost).sum::<usize>()
    }
}

/// Image formats recognised when decoding an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl AssetFormat {
    /// Detects the format from the leading magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        };
        f.write_str(name)
    }
}

/// A decoded binary asset and the URL it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Where the payload was fetched from
    pub url: String,
    /// Detected image format
    pub format: AssetFormat,
    /// Raw payload
    pub bytes: Vec<u8>,
}

impl Asset {
    /// Validates a raw payload and wraps it as an asset
    ///
    /// # Returns
    /// * `Ok(Asset)` if the payload is a recognised image
    /// * `Err(FetchError::Decode)` otherwise
    pub fn decode(url: impl Into<String>, bytes: Vec<u8>) -> Result<Self, FetchError> {
        let url = url.into();
        let format = AssetFormat::sniff(&bytes).ok_or_else(|| {
            FetchError::Decode(format!("unrecognised image data from {}", url))
        })?;
        Ok(Self { url, format, bytes })
    }

    pub fn is_cacheable(&self) -> bool {
        !self.bytes.is_empty()
    }

    pub fn cost(&self) -> usize {
        self.bytes.len() + self.url.len()
    }
}

/// Result ordering requested from the remote source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    PublishedAt,
    Relevancy,
    Popularity,
}

impl SortBy {
    /// Wire value expected by the remote source
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublishedAt => "publishedAt",
            Self::Relevancy => "relevancy",
            Self::Popularity => "popularity",
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "publishedat" | "published" | "newest" => Ok(Self::PublishedAt),
            "relevancy" | "relevance" => Ok(Self::Relevancy),
            "popularity" | "popular" => Ok(Self::Popularity),
            other => Err(format!(
                "Invalid sort order: '{}'. Valid values: published, relevancy, popularity",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            description: None,
            url: format!("https://news.example/{}", title),
            image_url: None,
            source_name: Some("Example".to_string()),
            author: None,
            published_at: None,
        }
    }

    #[test]
    fn test_empty_page_is_not_cacheable() {
        let page = ResultPage {
            query: "Apple".to_string(),
            page: 1,
            items: Vec::new(),
            total_available: 0,
        };
        assert!(!page.is_cacheable());
    }

    #[test]
    fn test_page_cost_grows_with_items() {
        let mut page = ResultPage {
            query: "Apple".to_string(),
            page: 1,
            items: vec![article("one")],
            total_available: 2,
        };
        let one = page.cost();
        page.items.push(article("two"));
        assert!(page.cost() > one);
    }

    #[test]
    fn test_sniff_recognises_png_and_jpeg() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(AssetFormat::sniff(&png), Some(AssetFormat::Png));
        assert_eq!(AssetFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(AssetFormat::Jpeg));
        assert_eq!(AssetFormat::sniff(b"GIF89a...."), Some(AssetFormat::Gif));
        assert_eq!(AssetFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(AssetFormat::Webp));
    }

    #[test]
    fn test_decode_rejects_non_image_payload() {
        let result = Asset::decode("https://img.example/a.png", b"<html>".to_vec());
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_sort_by_parse_aliases() {
        assert_eq!("newest".parse::<SortBy>().unwrap(), SortBy::PublishedAt);
        assert_eq!("Relevancy".parse::<SortBy>().unwrap(), SortBy::Relevancy);
        assert_eq!("popular".parse::<SortBy>().unwrap(), SortBy::Popularity);
        assert!("sideways".parse::<SortBy>().is_err());
    }

    #[test]
    fn test_result_page_serialization_preserves_item_order() {
        let page = ResultPage {
            query: "Apple".to_string(),
            page: 2,
            items: vec![article("b"), article("a"), article("c")],
            total_available: 57,
        };

        let json = serde_json::to_string(&page).expect("Failed to serialize ResultPage");
        let decoded: ResultPage =
            serde_json::from_str(&json).expect("Failed to deserialize ResultPage");

        assert_eq!(decoded, page);
        let titles: Vec<_> = decoded.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["b", "a", "c"]);
    }
}
