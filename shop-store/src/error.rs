//! Error types for the store crate.

use shop_core::CoreError;

/// Errors that can occur while reading or writing shop data.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The requested row does not exist, or is not visible to the caller.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// Submitted data refers to something that does not exist or is inconsistent.
    #[error("{0}")]
    Validation(String),

    /// Credentials or tokens were rejected.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The caller may not modify this row.
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// A domain rule failed (empty cart, invalid amount, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("duplicate value: {}", db.message()))
            }
            _ => Self::Database(err),
        }
    }
}

/// Maps a unique-constraint violation to a [`StoreError::Conflict`] carrying
/// `message`; every other error converts as usual.
pub(crate) fn conflict_as(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message()),
        _ => StoreError::from(err),
    }
}
