//! Error types for the synchronization engine.

use codescan_search::SearchError;
use codescan_store::StoreError;
use thiserror::Error;

/// Errors that can occur during index synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Relational store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Search backend operation failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Caller passed more keys than one partition allows; chunking is the
    /// caller's responsibility
    #[error("Too many keys in one partition: {count} > {max}")]
    TooManyKeys { count: usize, max: usize },

    /// The bulk synchronizer was used outside its started state
    #[error("Bulk synchronizer is not started")]
    NotStarted,

    /// A synchronous operation with no recovery path failed
    #[error("Unrecoverable indexation failures: {failures} errors among {total} requests")]
    Unrecoverable { failures: u64, total: u64 },
}
