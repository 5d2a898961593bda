//! Error types for dashboard operations

use crate::validation::ValidationErrors;
use dash_api::ApiError;
use thiserror::Error;

/// Dashboard operation errors
///
/// Every variant carries a message fit to show the user; the underlying API
/// failure, when there is one, is kept as the source.
#[derive(Debug, Error)]
pub enum Error {
    /// Client-side validation failed; no request was made
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    /// The operation needs a logged-in user; no request was made
    #[error("{0}")]
    AuthRequired(String),

    /// The backend call failed
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: ApiError,
    },

    /// The backend answered, but not with anything usable
    #[error("{0}")]
    Rejected(String),

    /// Invalid dashboard configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client setup failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Persisting client state failed
    #[error("Storage error: {0}")]
    Storage(#[from] dash_core::Error),
}

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an API failure with the message to show the user
    pub fn request(message: impl Into<String>, source: ApiError) -> Self {
        Error::Request {
            message: message.into(),
            source,
        }
    }

    /// Underlying API failure, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Request { source, .. } | Error::Api(source) => Some(source),
            _ => None,
        }
    }
}
