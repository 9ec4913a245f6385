//! Search error types.

use thiserror::Error;

/// Errors that can occur against the search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index is locked (another process has it open)
    #[error("Index is locked: {0}")]
    IndexLocked(String),

    /// The backend is unreachable; the whole batch failed
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    /// Schema mismatch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A stored payload could not be decoded
    #[error("Payload decode error: {0}")]
    Decode(String),
}
