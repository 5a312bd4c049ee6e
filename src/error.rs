use crate::db::error::DbError;
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, DomainError>;

/// Errors surfaced by every service operation. Messages are stable and safe to
/// show to callers; data-layer details are logged, never embedded.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A required field is missing or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A business rule rejected the operation (insufficient funds, bad split, ...)
    #[error("aborted: {0}")]
    Aborted(String),

    /// The data layer or a transaction failed
    #[error("internal error: {0}")]
    Internal(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("permission denied")]
    PermissionDenied,
}

/// Transport-neutral classification of a `DomainError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    Aborted,
    Internal,
    Unauthenticated,
    PermissionDenied,
}

impl DomainError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            DomainError::NotFound(_) => ErrorCode::NotFound,
            DomainError::Aborted(_) => ErrorCode::Aborted,
            DomainError::Internal(_) => ErrorCode::Internal,
            DomainError::Unauthenticated => ErrorCode::Unauthenticated,
            DomainError::PermissionDenied => ErrorCode::PermissionDenied,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        DomainError::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        DomainError::Aborted(msg.into())
    }

    /// Mapper replacing any db error by `Internal(msg)`, logging the cause.
    pub fn internal(msg: &'static str) -> impl FnOnce(DbError) -> DomainError {
        move |e| {
            tracing::error!(error = %e, context = msg, "data layer failure");
            DomainError::Internal(msg.to_string())
        }
    }

    /// Like [`DomainError::internal`], but a missing row becomes `NotFound(what)`.
    pub fn lookup(what: &'static str, msg: &'static str) -> impl FnOnce(DbError) -> DomainError {
        move |e| match e {
            DbError::NotFound => DomainError::NotFound(what.to_string()),
            other => DomainError::internal(msg)(other),
        }
    }
}

impl From<DbError> for DomainError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => DomainError::NotFound("entity not found".to_string()),
            DbError::UniqueViolation => DomainError::Aborted("entity already exists".to_string()),
            DbError::ForeignKey => DomainError::Aborted("referenced entity does not exist".to_string()),
            DbError::Validation(msg) => DomainError::InvalidArgument(msg),
            other => {
                tracing::error!(error = %other, "data layer failure");
                DomainError::Internal("data layer failure".to_string())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigErrorKind {
    #[error("failed to read file: {0}")]
    Read(std::io::Error),

    #[error("failed to parse file: {0}")]
    Parse(toml::de::Error),

    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(String, String),
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: std::path::PathBuf,
        #[source]
        source: ConfigErrorKind,
    },

    #[error("invalid configuration: {0}")]
    Env(#[source] ConfigErrorKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_do_not_leak_details() {
        let e: DomainError = DbError::Decode("column amount is NULL".into()).into();
        assert_eq!(e.code(), ErrorCode::Internal);
        assert!(!e.to_string().contains("amount"));
    }

    #[test]
    fn conflict_is_internal() {
        let e: DomainError = DbError::Conflict("storage_currency".into()).into();
        assert_eq!(e.code(), ErrorCode::Internal);
    }

    #[test]
    fn lookup_keeps_not_found() {
        let e = DomainError::lookup("item not found", "unable to update item")(DbError::NotFound);
        assert!(matches!(e, DomainError::NotFound(m) if m == "item not found"));

        let e = DomainError::lookup("item not found", "unable to update item")(DbError::UniqueViolation);
        assert!(matches!(e, DomainError::Internal(m) if m == "unable to update item"));

        let e = DomainError::internal("unable to complete purchase")(DbError::NotFound);
        assert_eq!(e.code(), ErrorCode::Internal);
    }
}
