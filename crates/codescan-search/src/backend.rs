//! The backend port the synchronization engine writes through.
//!
//! Implementations apply batches and report a per-item outcome instead of
//! an all-or-nothing result: partial failure is normal operation. An `Err`
//! is reserved for transport-level failure of the whole batch.

use codescan_types::{DocRef, IssueDoc};

use crate::error::SearchError;

/// Outcome of applying one document write or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocOutcome {
    pub doc: DocRef,
    pub success: bool,
}

impl DocOutcome {
    pub fn ok(doc: DocRef) -> Self {
        Self { doc, success: true }
    }

    pub fn failed(doc: DocRef) -> Self {
        Self {
            doc,
            success: false,
        }
    }
}

/// Field a scoped bulk delete matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeField {
    /// `branch_uuid`: every document of one branch.
    Branch,
    /// `project_uuid`: every document of one project (the routing key).
    Project,
}

impl ScopeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeField::Branch => "branch_uuid",
            ScopeField::Project => "project_uuid",
        }
    }
}

/// Bulk-writable, bulk-deletable document store addressed by id and
/// routing key.
pub trait IndexBackend: Send + Sync {
    /// Apply a batch of document writes. Returns one outcome per document;
    /// `Err` only when the whole batch could not be transported.
    fn write(&self, docs: &[IssueDoc]) -> Result<Vec<DocOutcome>, SearchError>;

    /// Apply a batch of point deletes by document address.
    fn delete(&self, refs: &[DocRef]) -> Result<Vec<DocOutcome>, SearchError>;

    /// Delete every document whose `field` equals `value`, scoped by the
    /// owning routing key.
    fn delete_by_field(
        &self,
        field: ScopeField,
        value: &str,
        routing: &str,
    ) -> Result<DocOutcome, SearchError>;

    /// Make applied changes visible to readers.
    fn flush(&self) -> Result<(), SearchError>;
}
