//! Quote, history, fundamentals, search, and watchlist endpoints

use crate::client::ApiClient;
use crate::error::Result;
use crate::serde_util::{lenient_datetime, parse_timestamp};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Latest quote for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One OHLCV bar of a historical series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Bar date as sent by the backend (date or datetime)
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PricePoint {
    /// Parsed bar time, if the backend sent a recognizable format
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.date)
    }
}

/// Body of `POST /stocks/historical`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoricalRequest {
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `1d`, `1wk` or `1mo`
    pub interval: String,
}

impl HistoricalRequest {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start_date: None,
            end_date: None,
            interval: interval.into(),
        }
    }
}

/// Company fundamentals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub symbol: String,
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub price_to_book: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub fifty_day_ma: Option<f64>,
    #[serde(default)]
    pub two_hundred_day_ma: Option<f64>,
}

/// Search hit / popular symbol entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub company_name: Option<String>,
}

impl SymbolInfo {
    pub fn new(symbol: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: Some(company_name.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Serialize)]
struct WatchlistRequest<'a> {
    symbols: &'a [String],
}

/// Stock data endpoints
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait StockApi: Send + Sync {
    /// `GET /stocks/quotes/{symbol}`
    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// `POST /stocks/quotes/batch`
    async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>>;

    /// `POST /stocks/historical`
    async fn historical(&self, request: &HistoricalRequest) -> Result<Vec<PricePoint>>;

    /// `GET /stocks/financials/{symbol}`
    async fn financials(&self, symbol: &str) -> Result<Financials>;

    /// `POST /stocks/search`
    async fn search(&self, query: &str) -> Result<Vec<SymbolInfo>>;

    /// `GET /stocks/popular`
    async fn popular(&self) -> Result<Vec<SymbolInfo>>;

    /// `GET /stocks/watchlist`
    async fn watchlist(&self) -> Result<Vec<String>>;

    /// `PUT /stocks/watchlist`
    async fn replace_watchlist(&self, symbols: &[String]) -> Result<Vec<String>>;

    /// `POST /stocks/watchlist/{symbol}`
    async fn add_to_watchlist(&self, symbol: &str) -> Result<()>;

    /// `DELETE /stocks/watchlist/{symbol}`
    async fn remove_from_watchlist(&self, symbol: &str) -> Result<()>;
}

#[async_trait]
impl StockApi for ApiClient {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.get(&["stocks", "quotes", symbol]).await
    }

    async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        self.send_json(Method::POST, &["stocks", "quotes", "batch"], symbols)
            .await
    }

    async fn historical(&self, request: &HistoricalRequest) -> Result<Vec<PricePoint>> {
        self.send_json(Method::POST, &["stocks", "historical"], request)
            .await
    }

    async fn financials(&self, symbol: &str) -> Result<Financials> {
        self.get(&["stocks", "financials", symbol]).await
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolInfo>> {
        self.send_json(Method::POST, &["stocks", "search"], &SearchRequest { query })
            .await
    }

    async fn popular(&self) -> Result<Vec<SymbolInfo>> {
        self.get(&["stocks", "popular"]).await
    }

    async fn watchlist(&self) -> Result<Vec<String>> {
        self.get(&["stocks", "watchlist"]).await
    }

    async fn replace_watchlist(&self, symbols: &[String]) -> Result<Vec<String>> {
        self.send_json(Method::PUT, &["stocks", "watchlist"], &WatchlistRequest { symbols })
            .await
    }

    async fn add_to_watchlist(&self, symbol: &str) -> Result<()> {
        self.send_empty(Method::POST, &["stocks", "watchlist", symbol])
            .await
    }

    async fn remove_from_watchlist(&self, symbol: &str) -> Result<()> {
        self.send_empty(Method::DELETE, &["stocks", "watchlist", symbol])
            .await
    }
}
