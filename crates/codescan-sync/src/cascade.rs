//! Synchronous, queue-bypassing deletes.
//!
//! Used for user-triggered deletes where the caller is not relying on
//! eventual consistency. There is no recovery item to fall back on, so any
//! failure propagates to the caller instead of being tolerated.

use tracing::info;

use codescan_search::{IndexBackend, ScopeField};
use codescan_types::DocRef;

use crate::bulk::{BulkSynchronizer, Deletion};
use crate::error::SyncError;
use crate::listener::NoopListener;
use crate::result::IndexingResult;

/// Backend-side bulk deletes scoped by key, routing, or field equality.
pub struct DeletionCascade<'a> {
    backend: &'a dyn IndexBackend,
}

impl<'a> DeletionCascade<'a> {
    pub fn new(backend: &'a dyn IndexBackend) -> Self {
        Self { backend }
    }

    /// Point-delete the given issue keys. An empty key list is a no-op.
    pub fn delete_by_keys(
        &self,
        routing: &str,
        keys: &[String],
    ) -> Result<IndexingResult, SyncError> {
        if keys.is_empty() {
            return Ok(IndexingResult::new());
        }

        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(self.backend, &mut listener);
        bulk.start();
        for key in keys {
            bulk.add_deletion(Deletion::Doc(DocRef::new(key, routing)))?;
        }
        let result = bulk.stop()?;

        info!(routing, count = keys.len(), "Deleted issues by key");
        Self::fail_on_failures(result)
    }

    /// Delete every document of one routing key (project).
    pub fn delete_by_routing(&self, routing: &str) -> Result<IndexingResult, SyncError> {
        self.delete_by_field(ScopeField::Project, routing, routing)
    }

    /// Delete every document matching a field equality, scoped by routing.
    pub fn delete_by_field(
        &self,
        field: ScopeField,
        value: &str,
        routing: &str,
    ) -> Result<IndexingResult, SyncError> {
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(self.backend, &mut listener);
        bulk.start();
        bulk.add_deletion(Deletion::ByField {
            field,
            value: value.to_string(),
            routing: routing.to_string(),
        })?;
        let result = bulk.stop()?;

        Self::fail_on_failures(result)
    }

    fn fail_on_failures(result: IndexingResult) -> Result<IndexingResult, SyncError> {
        if result.is_success() {
            Ok(result)
        } else {
            Err(SyncError::Unrecoverable {
                failures: result.failures,
                total: result.total,
            })
        }
    }
}
