use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to derive a content identity.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid content identity: {0}")]
    InvalidDigest(String),
}

/// Failure of an offset store backend.
///
/// Backend-specific error types (sqlx, HTTP) are flattened into these
/// variants so callers never depend on them.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Remote store timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed store data: {0}")]
    Malformed(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

impl From<bridge_traits::BridgeError> for StoreError {
    fn from(error: bridge_traits::BridgeError) -> Self {
        match error {
            bridge_traits::BridgeError::Timeout(after) => StoreError::Timeout(after),
            other => StoreError::Remote(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
