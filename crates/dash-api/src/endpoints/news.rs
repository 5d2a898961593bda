//! News endpoints

use crate::client::ApiClient;
use crate::error::Result;
use crate::serde_util::lenient_datetime;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// A news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub headline: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct PageQuery {
    limit: u32,
    offset: u32,
}

#[derive(Debug, Serialize)]
struct FilterRequest<'a> {
    symbol: &'a str,
    limit: u32,
}

#[derive(Debug, Serialize)]
struct SymbolsRequest<'a> {
    symbols: &'a [String],
    limit: u32,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: u32,
}

/// News endpoints
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait NewsApi: Send + Sync {
    /// `GET /news/latest?limit&offset`
    async fn latest(&self, limit: u32, offset: u32) -> Result<Vec<NewsArticle>>;

    /// `POST /news/filter`
    async fn by_symbol(&self, symbol: &str, limit: u32) -> Result<Vec<NewsArticle>>;

    /// `POST /news/by-symbols`; `limit` applies per symbol
    async fn by_symbols(&self, symbols: &[String], limit: u32) -> Result<Vec<NewsArticle>>;

    /// `POST /news/search`
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<NewsArticle>>;

    /// `GET /news/trending`
    async fn trending(&self) -> Result<Vec<NewsArticle>>;

    /// `GET /news/{id}`
    async fn article(&self, id: &str) -> Result<NewsArticle>;
}

#[async_trait]
impl NewsApi for ApiClient {
    async fn latest(&self, limit: u32, offset: u32) -> Result<Vec<NewsArticle>> {
        self.get_with_query(&["news", "latest"], &PageQuery { limit, offset })
            .await
    }

    async fn by_symbol(&self, symbol: &str, limit: u32) -> Result<Vec<NewsArticle>> {
        self.send_json(Method::POST, &["news", "filter"], &FilterRequest { symbol, limit })
            .await
    }

    async fn by_symbols(&self, symbols: &[String], limit: u32) -> Result<Vec<NewsArticle>> {
        self.send_json(
            Method::POST,
            &["news", "by-symbols"],
            &SymbolsRequest { symbols, limit },
        )
        .await
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<NewsArticle>> {
        self.send_json(Method::POST, &["news", "search"], &SearchRequest { query, limit })
            .await
    }

    async fn trending(&self) -> Result<Vec<NewsArticle>> {
        self.get(&["news", "trending"]).await
    }

    async fn article(&self, id: &str) -> Result<NewsArticle> {
        self.get(&["news", id]).await
    }
}
