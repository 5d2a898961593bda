//! Error types for dash-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dash-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for host collaborator operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Reading or writing the backing file failed
    #[error("Storage I/O failed for {path}: {source}")]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file did not contain a valid key/value document
    #[error("Storage file {path} is corrupt: {source}")]
    StorageCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A lock guarding shared state was poisoned
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}
