//! Error types for matching, curation and index management

use thiserror::Error;

use crate::normalize::NormalizeError;

/// Errors surfaced by the matching core.
///
/// Validation failures (`Validation`, `UnknownVocabulary`, `InvalidThreshold`,
/// `InvalidTransition`, `EntryNotFound`) are caller mistakes and must not be
/// retried. Index failures are scoped to one vocabulary.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Malformed input or an empty required field
    #[error("validation error: {0}")]
    Validation(String),

    /// One or more vocabulary names could not be resolved
    #[error("unknown vocabulary: {0}")]
    UnknownVocabulary(String),

    /// Threshold outside (0, 1]
    #[error("invalid threshold {0}: must be greater than 0 and at most 1")]
    InvalidThreshold(f64),

    /// Lifecycle transition not allowed from the entry's current mode
    #[error("cannot {action} an entry in mode {from}")]
    InvalidTransition { from: String, action: &'static str },

    /// Entry id not present in the vocabulary
    #[error("entry not found: {0}")]
    EntryNotFound(u64),

    /// The normalization collaborator failed
    #[error("normalization unavailable: {0}")]
    NormalizationUnavailable(#[from] NormalizeError),

    /// The stored index artifact could not be loaded
    #[error("index corrupt for vocabulary '{vocabulary}': {reason}")]
    IndexCorrupt { vocabulary: String, reason: String },

    /// Rebuild after corruption failed; a manual compile is required
    #[error("index unavailable for vocabulary '{0}': recompile required")]
    IndexUnavailable(String),

    /// IO error (index artifact)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (index artifact)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MatchError {
    /// True for errors caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MatchError::Validation(_)
                | MatchError::UnknownVocabulary(_)
                | MatchError::InvalidThreshold(_)
                | MatchError::InvalidTransition { .. }
                | MatchError::EntryNotFound(_)
        )
    }
}

/// Result type alias using [`MatchError`].
pub type Result<T> = std::result::Result<T, MatchError>;
