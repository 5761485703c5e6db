//! NewsAPI search client
//!
//! Fetches pages from a NewsAPI-compatible `/v2/everything` endpoint and maps
//! the response envelope onto `ResultPage` or a classified `FetchError`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{Article, ResultPage, SortBy};
use crate::error::FetchError;
use crate::source::RemoteSource;

/// Base URL for the NewsAPI search endpoint
const NEWS_API_BASE_URL: &str = "https://newsapi.org/v2/everything";

/// Response envelope returned by the search endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    articles: Vec<ApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    source: Option<ApiSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
}

/// Client for the NewsAPI search endpoint
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    /// Creates a client using the public endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: NEWS_API_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different endpoint (self-hosted mirrors, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parses a response body for the given request
    ///
    /// # Arguments
    /// * `status` - HTTP status of the response
    /// * `body` - Raw response body
    /// * `query` / `page` - The request this body answers
    fn parse_response(
        status: StatusCode,
        body: &str,
        query: &str,
        page: u32,
    ) -> Result<ResultPage, FetchError> {
        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        let response: ApiResponse = match serde_json::from_str(body) {
            Ok(response) => response,
            // Proxies and gateways answer 4xx with HTML or plain text
            Err(_) if !status.is_success() => {
                return Err(FetchError::Upstream {
                    code: status.as_u16().to_string(),
                    message: status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        if response.status != "ok" {
            return Err(FetchError::Upstream {
                code: response.code.unwrap_or_else(|| status.as_u16().to_string()),
                message: response.message.unwrap_or_default(),
            });
        }

        let items = response
            .articles
            .into_iter()
            .filter_map(parse_article)
            .collect();

        Ok(ResultPage {
            query: query.to_string(),
            page,
            items,
            total_available: response.total_results,
        })
    }
}

/// Converts a wire article, dropping entries without a title or link
fn parse_article(article: ApiArticle) -> Option<Article> {
    let title = article.title.filter(|t| !t.trim().is_empty())?;
    let url = article.url.filter(|u| !u.trim().is_empty())?;
    let published_at = article
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(Article {
        title,
        description: article.description,
        url,
        image_url: article.url_to_image,
        source_name: article.source.and_then(|s| s.name),
        author: article.author,
        published_at,
    })
}

#[async_trait]
impl RemoteSource for NewsApiClient {
    async fn fetch_page(
        &self,
        query: &str,
        from_date: Option<NaiveDate>,
        sort_by: SortBy,
        page: u32,
        page_size: u32,
    ) -> Result<ResultPage, FetchError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("sortBy", sort_by.as_str().to_string()),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(date) = from_date {
            params.push(("from", date.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .header("X-Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        Self::parse_response(status, &body, query, page)
    }
}
