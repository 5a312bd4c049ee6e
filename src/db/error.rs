use deadpool_postgres::{BuildError, PoolError};
use thiserror::Error;
use tokio_postgres::error::SqlState;

// DbError is the lowest level error type, wrapping errors from the database layer. It does not wrap
// any higher level errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Record not found
    #[error("not found")]
    NotFound,

    /// Unique constraint violation
    #[error("unique violation")]
    UniqueViolation,

    /// Foreign key constraint violation
    #[error("foreign key violation")]
    ForeignKey,

    /// A guarded write matched no row: the row changed since it was read
    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Pg(tokio_postgres::Error),

    #[error(transparent)]
    Migrate(#[from] refinery::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("row decode error: {0}")]
    Decode(String),

    #[error("input error: {0}")]
    Validation(String),
}

impl From<tokio_postgres::Error> for DbError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => DbError::UniqueViolation,
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => DbError::ForeignKey,
            Some(code) if *code == SqlState::NUMERIC_VALUE_OUT_OF_RANGE => {
                DbError::Conflict("amount out of range".to_string())
            }
            _ => DbError::Pg(e),
        }
    }
}
