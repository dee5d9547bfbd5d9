use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// SQLSTATE codes Postgres raises when a lock could not be acquired in time or
/// a transaction lost a serialization race. All of them are safe to retry.
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const CHECK_VIOLATION: &str = "23514";

/// Coarse classification of an [`AppError`], used by callers that map errors
/// onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    Conflict,
    Persistence,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds in account {account_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        account_id: Uuid,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Converts a driver error, promoting lock and serialization failures to
    /// [`AppError::Conflict`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("Row not found".to_string());
        }

        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                match classify_sqlstate(&code) {
                    Some(ErrorKind::Conflict) => {
                        return AppError::Conflict(format!(
                            "{} (sqlstate {})",
                            db_err.message(),
                            code
                        ));
                    }
                    Some(ErrorKind::Validation) => {
                        return AppError::Validation(db_err.message().to_string());
                    }
                    _ => {}
                }
            }
        }

        AppError::Database(err)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Database(_) => ErrorKind::Persistence,
            AppError::Config(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if repeating the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// HTTP status the request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::InsufficientFunds => 422,
            ErrorKind::Conflict => 409,
            ErrorKind::Persistence => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::from_sqlx(err)
    }
}

/// Maps a Postgres SQLSTATE onto the error kind it should surface as.
pub fn classify_sqlstate(code: &str) -> Option<ErrorKind> {
    match code {
        DEADLOCK_DETECTED | SERIALIZATION_FAILURE | LOCK_NOT_AVAILABLE => Some(ErrorKind::Conflict),
        CHECK_VIOLATION => Some(ErrorKind::Validation),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_classify_conflict_codes() {
        assert_eq!(classify_sqlstate("40P01"), Some(ErrorKind::Conflict));
        assert_eq!(classify_sqlstate("40001"), Some(ErrorKind::Conflict));
        assert_eq!(classify_sqlstate("55P03"), Some(ErrorKind::Conflict));
    }

    #[test]
    fn test_classify_other_codes() {
        assert_eq!(classify_sqlstate("23514"), Some(ErrorKind::Validation));
        assert_eq!(classify_sqlstate("23505"), None);
        assert_eq!(classify_sqlstate("08006"), None);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = AppError::from_sqlx(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_pool_timeout_is_persistence() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.status_code(), 503);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(AppError::Conflict("deadlock".to_string()).is_retryable());
        assert!(!AppError::Validation("bad".to_string()).is_retryable());
        assert!(!AppError::NotFound("gone".to_string()).is_retryable());

        let insufficient = AppError::InsufficientFunds {
            account_id: Uuid::new_v4(),
            requested: dec!(50),
            available: dec!(30),
        };
        assert!(!insufficient.is_retryable());
        assert_eq!(insufficient.status_code(), 422);
        assert_eq!(insufficient.label(), "insufficient_funds");
    }

    #[test]
    fn test_insufficient_funds_message() {
        let id = Uuid::new_v4();
        let err = AppError::InsufficientFunds {
            account_id: id,
            requested: dec!(50),
            available: dec!(30),
        };
        let message = err.to_string();
        assert!(message.contains(&id.to_string()));
        assert!(message.contains("requested 50"));
        assert!(message.contains("available 30"));
    }
}
