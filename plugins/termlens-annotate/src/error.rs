//! Service error types.

use std::path::PathBuf;

use termlens_core::MatchError;
use thiserror::Error;

/// Errors surfaced by the annotation service and its loader.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Error from the matching core
    #[error(transparent)]
    Match(#[from] MatchError),

    /// A dictionary row could not be imported
    #[error("{}:{line}: {source}", path.display())]
    Dictionary {
        path: PathBuf,
        line: usize,
        #[source]
        source: MatchError,
    },

    /// The request did not finish within the configured timeout
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The blocking worker panicked or was cancelled
    #[error("worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON request or config
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// True when the caller sent something invalid.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServiceError::Match(err) => err.is_validation(),
            ServiceError::Json(_) => true,
            _ => false,
        }
    }
}

/// Result type alias using [`ServiceError`].
pub type Result<T> = std::result::Result<T, ServiceError>;
