//! Dashboard services for stockdash
//!
//! This crate holds the stateful part of the dashboard client:
//!
//! - [`AuthService`]: current user and authentication status, login, logout,
//!   registration, profile updates, and session checks
//! - [`StockService`]: the selected symbol and timeframe, the joined
//!   quote/history/fundamentals/news fetch with its stale-response guard, the
//!   watchlist, and the dark-mode preference
//! - [`ChatService`]: chat sessions, the active transcript, and the symbol
//!   context attached to each turn
//!
//! The services are explicit objects wired together once by [`Dashboard`]
//! and shared through `Arc`; state is published on `tokio::sync::watch`
//! channels so any front-end can subscribe to changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use dash_app::Dashboard;
//! use dash_core::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> dash_app::Result<()> {
//! let dashboard = Dashboard::builder()
//!     .store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! dashboard.start().await;
//! dashboard.stocks().change_symbol("AAPL").await?;
//!
//! if let Some(snapshot) = dashboard.stocks().state().snapshot {
//!     println!("{} {:.2}", snapshot.symbol, snapshot.quote.price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod stock;
pub mod timeframe;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthHandle, AuthService, AuthState, AuthStatus};
pub use chat::{ActiveSession, ChatMessage, ChatService, ChatState};
pub use config::{DashboardConfig, DashboardConfigBuilder, TimeframeRefresh};
pub use dashboard::{Dashboard, DashboardBuilder};
pub use error::{Error, Result};
pub use stock::{FetchOutcome, StockService, StockSnapshot, StockState};
pub use timeframe::Timeframe;
pub use validation::{RegistrationForm, ValidationErrors};
