//! Storage Layer
//!
//! SQLite persistence for the reading ledger and patient records, behind a
//! pooled repository.

mod repository;
mod schema;

pub use repository::{NewReading, Patient, Reading, Repository};
pub use sqlx::pool::PoolConnection;
pub use sqlx::{Sqlite, SqliteConnection};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Reading {reading_id} stored but retention trim failed: {reason}")]
    TrimFailed { reading_id: i64, reason: String },
    #[error("Invalid database url: {0}")]
    InvalidUrl(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}
