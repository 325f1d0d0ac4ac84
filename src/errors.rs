use sea_orm::error::{DbErr, RuntimeErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine-readable error category returned alongside every failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    InvalidAdjustment,
    ConcurrencyConflict,
    Database,
    Event,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Insufficient stock for {product}: requested {requested}, available {available} (short by {})",
        .requested - .available
    )]
    InsufficientStock {
        product_id: Uuid,
        product: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Database error: {0}")]
    DatabaseError(DbErr),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Message fragments for conflicts that reach us without a driver error code.
const CONFLICT_MESSAGES: [&str; 4] = [
    "could not serialize access",
    "deadlock detected",
    "database is locked",
    "database table is locked",
];

/// Postgres SQLSTATE `40001` (serialization_failure) and `40P01`
/// (deadlock_detected), or a SQLite result code whose primary code is
/// `SQLITE_BUSY` (5) or `SQLITE_LOCKED` (6), extended codes included.
/// SQLSTATEs are always five characters; SQLite codes stay below five digits.
fn is_conflict_code(code: &str) -> bool {
    if code.len() == 5 {
        return code == "40001" || code == "40P01";
    }
    matches!(code.parse::<i32>(), Ok(n) if matches!(n & 0xff, 5 | 6))
}

/// The backend's own error code, when the driver reported one.
fn database_code(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        ServiceError::db_error(err)
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a database error, promoting serialization failures to
    /// [`ServiceError::ConcurrencyConflict`] so the unit of work can be retried.
    pub fn db_error(err: DbErr) -> Self {
        let conflict = match database_code(&err) {
            Some(code) => is_conflict_code(&code),
            None => {
                let message = err.to_string();
                CONFLICT_MESSAGES.iter().any(|marker| message.contains(marker))
            }
        };
        if conflict {
            ServiceError::ConcurrencyConflict(err.to_string())
        } else {
            ServiceError::DatabaseError(err)
        }
    }

    pub fn validation(field: &str, message: impl AsRef<str>) -> Self {
        ServiceError::ValidationError(format!("{}: {}", field, message.as_ref()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::InvalidAdjustment(_) => ErrorKind::InvalidAdjustment,
            Self::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
            Self::DatabaseError(_) => ErrorKind::Database,
            Self::EventError(_) => ErrorKind::Event,
            Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Only serialization conflicts are safe to replay from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }

    /// Returns the message suitable for the point-of-sale caller.
    /// Storage and internal failures return generic messages to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) => "Internal error".to_string(),
            Self::ConcurrencyConflict(_) => {
                "The inventory was changed by another transaction, please retry".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Structured error body carried by a failed [`crate::LedgerResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(error: &ServiceError) -> Self {
        Self {
            kind: error.kind(),
            message: error.response_message(),
        }
    }
}
