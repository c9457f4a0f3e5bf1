//! # Database Error Types
//!
//! Error types for database operations and the combined engine result.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Business rule violation           │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module)               CoreError (larder-core)           │
//! │       │                                   │                             │
//! │       └───────────────┬───────────────────┘                             │
//! │                       ▼                                                 │
//! │              LedgerError (Core | Db)                                    │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │  Caller surfaces the failure reason to the end user verbatim           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use larder_core::{CoreError, ValidationError};

// =============================================================================
// Db Error
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate product or supplier name
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for plain database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error (engines)
// =============================================================================

/// The tagged result type returned by every ledger operation: either a
/// business rule violation or a storage failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business rule violation (insufficient inventory, already processed...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(err.into())
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_wraps_into_ledger_error() {
        let err: LedgerError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));
        assert_eq!(err.to_string(), "Validation error: name is required");
    }

    #[test]
    fn test_core_error_message_passes_through() {
        let err: LedgerError = CoreError::AlreadyProcessed {
            id: "b-1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Bill b-1 is already processed");
    }
}
