//! Error handling utilities for repositories

use feed_core::error::DomainError;
use feed_core::value_objects::PostId;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Check for unique violation and return appropriate error or fallback
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique();
        }
    }
    DomainError::DatabaseError(e.to_string())
}

/// Map a failed reaction insert
///
/// The `(post_id, user_id)` constraint means "already reacted"; the foreign
/// key means the post is gone.
pub fn map_reaction_insert_error(e: SqlxError, post_id: &PostId) -> DomainError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return post_not_found(post_id);
        }
    }
    map_unique_violation(e, || DomainError::DuplicateReaction)
}

/// Create a "post not found" error
pub fn post_not_found(id: &PostId) -> DomainError {
    DomainError::PostNotFound(id.clone())
}
