use diesel::result::{DatabaseErrorKind, Error as DbError};
use thiserror::Error;

/// Errors that can occur when reading or writing persistent state
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to obtain a database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Referenced row does not exist: {0}")]
    ForeignKeyViolation(String),

    #[error("Query execution failed: {0}")]
    Query(DbError),

    #[error("Failed to run migrations: {0}")]
    Migration(String),

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),

    #[error("Store lock poisoned")]
    Locked,

    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::UniqueViolation(info.message().to_string())
            }
            DbError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::ForeignKeyViolation(info.message().to_string())
            }
            other => StoreError::Query(other),
        }
    }
}
