//! Store error types.

use thiserror::Error;

/// Errors that can occur in the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error
    #[error("Sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Write connection lock poisoned by a panicking holder
    #[error("Store lock poisoned: {0}")]
    Lock(String),

    /// Payload encoding error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Lock("poisoned".to_string());
        assert_eq!(err.to_string(), "Store lock poisoned: poisoned");
    }
}
