//! Configuration for the dashboard services

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the symbol shown on startup
pub const DEFAULT_SYMBOL_ENV: &str = "DASH_DEFAULT_SYMBOL";

/// How a timeframe change refreshes the selected symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeRefresh {
    /// Re-fetch quote, history, fundamentals, and news together
    #[default]
    FullBundle,
    /// Re-fetch only the price series and patch it into the current snapshot
    HistoricalOnly,
}

/// Configuration for the dashboard services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Symbol selected when the dashboard starts
    pub default_symbol: String,

    /// Number of articles fetched alongside each symbol
    pub symbol_news_limit: u32,

    /// What a timeframe change re-fetches
    pub timeframe_refresh: TimeframeRefresh,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_symbol: "IBM".to_string(),
            symbol_news_limit: 10,
            timeframe_refresh: TimeframeRefresh::FullBundle,
        }
    }
}

impl DashboardConfig {
    /// Create a new configuration builder
    pub fn builder() -> DashboardConfigBuilder {
        DashboardConfigBuilder::default()
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_symbol.trim().is_empty() {
            return Err(Error::Config("default_symbol must not be empty".to_string()));
        }

        if self.symbol_news_limit == 0 {
            return Err(Error::Config(
                "symbol_news_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for DashboardConfig
#[derive(Debug, Default)]
pub struct DashboardConfigBuilder {
    default_symbol: Option<String>,
    symbol_news_limit: Option<u32>,
    timeframe_refresh: Option<TimeframeRefresh>,
}

impl DashboardConfigBuilder {
    /// Set the symbol selected on startup
    pub fn default_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.default_symbol = Some(symbol.into());
        self
    }

    /// Set the number of articles fetched per symbol
    pub fn symbol_news_limit(mut self, limit: u32) -> Self {
        self.symbol_news_limit = Some(limit);
        self
    }

    /// Set the timeframe refresh policy
    pub fn timeframe_refresh(mut self, refresh: TimeframeRefresh) -> Self {
        self.timeframe_refresh = Some(refresh);
        self
    }

    /// Apply `DASH_DEFAULT_SYMBOL` if it is set and no symbol was given
    pub fn with_env(mut self) -> Self {
        if self.default_symbol.is_none() {
            self.default_symbol = std::env::var(DEFAULT_SYMBOL_ENV).ok();
        }
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<DashboardConfig> {
        let defaults = DashboardConfig::default();
        let config = DashboardConfig {
            default_symbol: self
                .default_symbol
                .map_or(defaults.default_symbol, |s| s.trim().to_uppercase()),
            symbol_news_limit: self.symbol_news_limit.unwrap_or(defaults.symbol_news_limit),
            timeframe_refresh: self.timeframe_refresh.unwrap_or(defaults.timeframe_refresh),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(config.default_symbol, "IBM");
        assert_eq!(config.symbol_news_limit, 10);
        assert_eq!(config.timeframe_refresh, TimeframeRefresh::FullBundle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_normalizes_symbol() {
        let config = DashboardConfig::builder()
            .default_symbol(" aapl ")
            .timeframe_refresh(TimeframeRefresh::HistoricalOnly)
            .build()
            .unwrap();

        assert_eq!(config.default_symbol, "AAPL");
        assert_eq!(config.timeframe_refresh, TimeframeRefresh::HistoricalOnly);
    }

    #[test]
    fn test_validation() {
        assert!(DashboardConfig::builder().default_symbol("  ").build().is_err());
        assert!(DashboardConfig::builder().symbol_news_limit(0).build().is_err());
    }

    #[test]
    fn test_explicit_symbol_wins_over_env() {
        let config = DashboardConfig::builder()
            .default_symbol("MSFT")
            .with_env()
            .build()
            .unwrap();
        assert_eq!(config.default_symbol, "MSFT");
    }
}
