//! Typed REST client for the stockdash backend
//!
//! This crate is the HTTP client adapter of the dashboard. It provides:
//!
//! - [`ApiClient`]: a cloneable `reqwest` wrapper that attaches the stored
//!   bearer token to every request and runs the 401 interceptor
//! - Endpoint traits ([`AuthApi`], [`StockApi`], [`NewsApi`], [`ChatApi`])
//!   that the dashboard services depend on, implemented by [`ApiClient`]
//! - Wire models for every request and response body
//!
//! # Example
//!
//! ```rust,no_run
//! use dash_api::{ApiClient, ApiConfig, StockApi};
//! use dash_core::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> dash_api::Result<()> {
//! let config = ApiConfig::builder()
//!     .base_url("http://localhost:8000/api")
//!     .build()?;
//! let client = ApiClient::new(config, Arc::new(MemoryStore::new()))?;
//!
//! let quote = client.quote("AAPL").await?;
//! println!("{} {:.2}", quote.symbol, quote.price);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod serde_util;

pub use client::{ApiClient, LoginRedirect, UnauthorizedHandler};
pub use config::{ApiConfig, ApiConfigBuilder};
pub use endpoints::auth::{AuthApi, LoginResponse, NewUser, ProfileUpdate, User};
pub use endpoints::chat::{
    ChatApi, ChatContext, ChatReply, ChatRequest, ChatSession, MessageRecord, SessionUpdate,
};
pub use endpoints::news::{NewsApi, NewsArticle};
pub use endpoints::stocks::{Financials, HistoricalRequest, PricePoint, Quote, StockApi, SymbolInfo};
pub use error::{ApiError, Result};

#[cfg(any(test, feature = "mock"))]
pub use endpoints::{
    auth::MockAuthApi, chat::MockChatApi, news::MockNewsApi, stocks::MockStockApi,
};
