//! Feed error types
//!
//! Every failure a feed operation can report, classified by how the caller
//! should react to it.

use feed_common::{AppError, ConfigError};
use feed_core::{DomainError, PostId};
use validator::ValidationErrors;

/// Feed operation error
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Missing or placeholder backend credentials; fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Empty or oversized content; never reaches a store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reaction already exists; stores treat it as "already reacted"
    #[error("Reaction already exists")]
    DuplicateReaction,

    /// Post is not in the feed or no longer in the store
    #[error("Post not found: {0}")]
    NotFound(PostId),

    /// Network or backend failure; the feed keeps its last known state
    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// Failures that will not go away on retry
    ///
    /// Optimistic state is rolled back only for these.
    pub fn is_definite(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }

    /// Get an error code string for reporting
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DuplicateReaction => "DUPLICATE_REACTION",
            Self::NotFound(_) => "UNKNOWN_POST",
            Self::Remote(_) => "REMOTE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DomainError> for FeedError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::PostNotFound(id) => Self::NotFound(id),
            DomainError::InternalError(msg) => Self::Internal(msg),
            e if e.is_conflict() => Self::DuplicateReaction,
            e if e.is_validation() => Self::Validation(e.to_string()),
            // Everything left comes from a collaborator
            e => Self::Remote(e.to_string()),
        }
    }
}

impl From<ValidationErrors> for FeedError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<ConfigError> for FeedError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Configuration(msg) => AppError::Setup(msg),
            FeedError::Internal(msg) => AppError::internal(anyhow::anyhow!(msg)),
            FeedError::Validation(msg) => AppError::Validation(msg),
            FeedError::DuplicateReaction => AppError::Domain(DomainError::DuplicateReaction),
            FeedError::NotFound(id) => AppError::NotFound(format!("post {id}")),
            FeedError::Remote(msg) => AppError::Remote(msg),
        }
    }
}

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;
