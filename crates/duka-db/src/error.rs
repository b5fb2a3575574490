//! # Database Error Types
//!
//! Error types for database and ledger-service operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (duka-core)               │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ◄────────────────┘                               │
//! │       │                                                                 │
//! │       │  Conflict ──► rolled back and retried by LedgerService          │
//! │       │               (never reaches the caller)                        │
//! │       ▼                                                                 │
//! │  UI shows a message; the ledger is unchanged                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use duka_core::CoreError;
use thiserror::Error;

/// Database and ledger-service errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `get` on an id that was never created or was deleted
    /// - update/delete of a missing id
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A version-checked write touched no row, or SQLite reported the
    /// database busy/locked. Retryable.
    #[error("Write conflict on {entity} {id}")]
    Conflict { entity: String, id: String },

    /// An optimistic transaction kept conflicting until the retry budget
    /// ran out.
    #[error("Transaction failed after {attempts} attempt(s)")]
    TransactionFailed { attempts: u32 },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Pool closed or exhausted
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed (constraint violations included).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Embedded payments or a backup file could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backup or config file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is unreadable or holds invalid values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A ledger rule refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error for a given entity type and ID.
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether the failed operation may succeed if run again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    /// Whether a referenced entity (or embedded payment) is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::NotFound { .. } | DbError::Core(CoreError::NotFound { .. })
        )
    }

    /// Returns the ledger rule that refused the operation, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            DbError::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy/locked → Conflict, otherwise QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::ConnectionFailed
/// Other                       → DbError::QueryFailed
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

                // SQLITE_BUSY (5) / SQLITE_LOCKED (6) and their extended codes
                let busy = matches!(
                    db_err.code().as_deref(),
                    Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
                ) || msg.contains("database is locked")
                    || msg.contains("database table is locked");

                if busy {
                    DbError::Conflict {
                        entity: "database".to_string(),
                        id: "busy".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionFailed("Connection pool exhausted".to_string())
            }

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

impl From<duka_core::ValidationError> for DbError {
    fn from(err: duka_core::ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(DbError::conflict("Sale", "s1").is_retryable());
        assert!(!DbError::not_found("Sale", "s1").is_retryable());
        assert!(!DbError::TransactionFailed { attempts: 5 }.is_retryable());
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: DbError = CoreError::not_found("Customer", "c1").into();
        assert_eq!(err.to_string(), "Customer not found: c1");
        assert!(matches!(err.as_core(), Some(CoreError::NotFound { .. })));
    }
}
