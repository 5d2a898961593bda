//! Error types for backend API calls

use thiserror::Error;

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

fn detail_suffix(detail: Option<&String>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

/// Errors that can occur while talking to the backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered 401; the stored token has already been cleared
    #[error("Authentication required{}", detail_suffix(.detail.as_ref()))]
    Unauthorized {
        /// Server-provided `detail` message, when present
        detail: Option<String>,
    },

    /// The backend answered with a non-success status
    #[error("HTTP {status}{}", detail_suffix(.detail.as_ref()))]
    Status {
        status: u16,
        /// Server-provided `detail` message, when present
        detail: Option<String>,
    },

    /// The request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connection refused, reset, ...)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Body could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] dash_core::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }
}

impl ApiError {
    /// Server-provided detail message, if the backend sent one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { detail } | ApiError::Status { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    /// HTTP status code, if the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is an authentication failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Pick the message to show a user: the server detail, or `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or(fallback).to_string()
    }
}
