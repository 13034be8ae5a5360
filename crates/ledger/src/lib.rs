//! Bounded Reading Ledger
//!
//! Admits weight readings per `(room, bed)`, keeps only the most recent
//! `retention_depth` readings of each bed and fans every admitted reading
//! out to live subscribers.

mod ledger;

pub use ledger::{Ledger, LedgerConfig, LiveReading};

use storage::StorageError;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Retention depth must be at least 1")]
    InvalidRetentionDepth,
    #[error("Broadcast capacity must be at least 1")]
    InvalidBroadcastCapacity,
}
