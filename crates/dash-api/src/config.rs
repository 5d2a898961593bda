//! Configuration for the backend client

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable holding the backend base URL
pub const BASE_URL_ENV: &str = "DASH_API_BASE_URL";

/// Environment variable holding the per-request timeout in seconds
pub const TIMEOUT_ENV: &str = "DASH_REQUEST_TIMEOUT_SECS";

/// Default backend location
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Configuration for [`ApiClient`](crate::ApiClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// User agent sent with each request
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("stockdash/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    /// Create a new configuration builder
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }

    /// Defaults overridden by `DASH_API_BASE_URL` / `DASH_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.parsed_base_url()?;

        if self.request_timeout.is_zero() {
            return Err(ApiError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse the base URL, requiring an http(s) scheme
    pub fn parsed_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ApiError::Config(format!(
                "base_url '{}' cannot be used as a base",
                self.base_url
            )));
        }
        Ok(url)
    }
}

/// Builder for ApiConfig
#[derive(Debug, Default)]
pub struct ApiConfigBuilder {
    base_url: Option<String>,
    request_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiConfigBuilder {
    /// Set the backend base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Load unset values from the environment
    pub fn with_env(mut self) -> Self {
        if self.base_url.is_none() {
            if let Ok(url) = std::env::var(BASE_URL_ENV) {
                self.base_url = Some(url);
            }
        }
        if self.request_timeout.is_none() {
            if let Some(secs) = std::env::var(TIMEOUT_ENV)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
            {
                self.request_timeout = Some(Duration::from_secs(secs));
            }
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ApiConfig> {
        let defaults = ApiConfig::default();

        let config = ApiConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        };

        config.validate()?;
        Ok(config)
    }
}
