//! Bulk application of documents and deletions in bounded batches.
//!
//! `add` flushes inline once a batch fills, so memory stays bounded no
//! matter how large the scan is. A transport failure marks the current
//! batch failed and the run continues: batches already flushed are never
//! rolled back, and failed items simply stay in the recovery queue.

use tracing::{debug, warn};

use codescan_search::{DocOutcome, IndexBackend, ScopeField};
use codescan_types::{DocRef, IssueDoc};

use crate::error::SyncError;
use crate::listener::IndexingListener;
use crate::result::IndexingResult;

/// Default maximum documents per batch.
const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// A deletion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    /// Point delete of one document.
    Doc(DocRef),
    /// Scoped delete of every document matching a field equality.
    ByField {
        field: ScopeField,
        value: String,
        routing: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkState {
    Idle,
    Started,
    Stopped,
}

/// Applies a stream of documents and deletions to the backend.
pub struct BulkSynchronizer<'a> {
    backend: &'a dyn IndexBackend,
    listener: &'a mut dyn IndexingListener,
    max_batch_size: usize,
    state: BulkState,
    pending_docs: Vec<IssueDoc>,
    pending_deletes: Vec<DocRef>,
    result: IndexingResult,
}

impl<'a> BulkSynchronizer<'a> {
    pub fn new(backend: &'a dyn IndexBackend, listener: &'a mut dyn IndexingListener) -> Self {
        Self {
            backend,
            listener,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            state: BulkState::Idle,
            pending_docs: Vec::new(),
            pending_deletes: Vec::new(),
            result: IndexingResult::new(),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Begin a run. Resets any previous accounting.
    pub fn start(&mut self) {
        self.state = BulkState::Started;
        self.pending_docs.clear();
        self.pending_deletes.clear();
        self.result = IndexingResult::new();
    }

    fn ensure_started(&self) -> Result<(), SyncError> {
        if self.state == BulkState::Started {
            Ok(())
        } else {
            Err(SyncError::NotStarted)
        }
    }

    /// Buffer one document write, flushing inline when the batch is full.
    pub fn add(&mut self, doc: IssueDoc) -> Result<(), SyncError> {
        self.ensure_started()?;
        self.pending_docs.push(doc);
        if self.pending_docs.len() >= self.max_batch_size {
            self.flush_docs();
        }
        Ok(())
    }

    /// Buffer one deletion. Point deletes batch like writes; field-scoped
    /// deletes execute immediately.
    pub fn add_deletion(&mut self, deletion: Deletion) -> Result<(), SyncError> {
        self.ensure_started()?;
        match deletion {
            Deletion::Doc(doc_ref) => {
                self.pending_deletes.push(doc_ref);
                if self.pending_deletes.len() >= self.max_batch_size {
                    self.flush_deletes();
                }
            }
            Deletion::ByField {
                field,
                value,
                routing,
            } => {
                match self.backend.delete_by_field(field, &value, &routing) {
                    Ok(outcome) => self.record_outcomes(&[outcome]),
                    Err(e) => {
                        warn!(
                            field = field.as_str(),
                            value = %value,
                            error = %e,
                            "Scoped delete failed, scope stays queued for the next sweep"
                        );
                        self.result.record_failure();
                    }
                }
            }
        }
        Ok(())
    }

    /// Flush remaining batches, report the final result to the listener and
    /// return it. Calling `stop` on a run that never started is a no-op
    /// with an empty result.
    pub fn stop(&mut self) -> Result<IndexingResult, SyncError> {
        if self.state != BulkState::Started {
            return Ok(IndexingResult::new());
        }

        self.flush_docs();
        self.flush_deletes();

        if let Err(e) = self.backend.flush() {
            warn!(error = %e, "Backend flush failed");
        }

        self.state = BulkState::Stopped;
        let result = self.result.clone();
        self.listener.on_finish(&result);

        debug!(
            total = result.total,
            failures = result.failures,
            "Bulk run stopped"
        );
        Ok(result)
    }

    fn record_outcomes(&mut self, outcomes: &[DocOutcome]) {
        let mut successes = Vec::new();
        for outcome in outcomes {
            if outcome.success {
                self.result.record_success();
                successes.push(outcome.doc.clone());
            } else {
                self.result.record_failure();
            }
        }
        if !successes.is_empty() {
            self.listener.on_success(&successes);
        }
    }

    fn flush_docs(&mut self) {
        if self.pending_docs.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending_docs);
        match self.backend.write(&batch) {
            Ok(outcomes) => self.record_outcomes(&outcomes),
            Err(e) => {
                warn!(
                    count = batch.len(),
                    error = %e,
                    "Batch write failed, items stay queued for the next sweep"
                );
                for _ in &batch {
                    self.result.record_failure();
                }
            }
        }
    }

    fn flush_deletes(&mut self) {
        if self.pending_deletes.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending_deletes);
        match self.backend.delete(&batch) {
            Ok(outcomes) => self.record_outcomes(&outcomes),
            Err(e) => {
                warn!(
                    count = batch.len(),
                    error = %e,
                    "Delete batch failed, items stay queued for the next sweep"
                );
                for _ in &batch {
                    self.result.record_failure();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoopListener;
    use chrono::Utc;
    use codescan_search::FakeIndex;
    use codescan_types::{SecurityCategory, VulnerabilityProbability};

    fn sample_doc(key: &str) -> IssueDoc {
        IssueDoc {
            key: key.to_string(),
            component_uuid: "C1".to_string(),
            project_uuid: "P1".to_string(),
            branch_uuid: "B1".to_string(),
            is_main_branch: true,
            rule_key: "repo:rule".to_string(),
            severity: "MAJOR".to_string(),
            status: "OPEN".to_string(),
            resolution: None,
            language: None,
            line: None,
            effort: None,
            tags: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
            cwe: vec![],
            owasp_top10: vec![],
            owasp_asvs_40: vec![],
            sans_top25: vec![],
            sq_category: SecurityCategory::Others,
            vulnerability_probability: VulnerabilityProbability::Low,
            impacts: vec![],
        }
    }

    #[test]
    fn test_stop_from_idle_is_noop() {
        let backend = FakeIndex::new();
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener);

        let result = bulk.stop().unwrap();
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_add_requires_started() {
        let backend = FakeIndex::new();
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener);

        assert!(matches!(
            bulk.add(sample_doc("I1")),
            Err(SyncError::NotStarted)
        ));
        assert!(matches!(
            bulk.add_deletion(Deletion::Doc(DocRef::new("I1", "P1"))),
            Err(SyncError::NotStarted)
        ));
    }

    #[test]
    fn test_batches_flush_inline() {
        let backend = FakeIndex::new();
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener).with_max_batch_size(2);
        bulk.start();

        bulk.add(sample_doc("I1")).unwrap();
        assert_eq!(backend.doc_count(), 0);
        bulk.add(sample_doc("I2")).unwrap();
        // batch limit reached: flushed without waiting for stop
        assert_eq!(backend.doc_count(), 2);
        bulk.add(sample_doc("I3")).unwrap();

        let result = bulk.stop().unwrap();
        assert_eq!(result.total, 3);
        assert!(result.is_success());
        assert_eq!(backend.doc_count(), 3);
    }

    #[test]
    fn test_transport_failure_does_not_abort_flushed_batches() {
        let backend = FakeIndex::new();
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener).with_max_batch_size(2);
        bulk.start();

        bulk.add(sample_doc("I1")).unwrap();
        bulk.add(sample_doc("I2")).unwrap();
        assert_eq!(backend.doc_count(), 2);

        backend.set_unavailable(true);
        bulk.add(sample_doc("I3")).unwrap();
        bulk.add(sample_doc("I4")).unwrap();

        backend.set_unavailable(false);
        let result = bulk.stop().unwrap();

        assert_eq!(result.total, 4);
        assert_eq!(result.failures, 2);
        // the first batch survived the later transport failure
        assert_eq!(backend.doc_count(), 2);
    }

    #[test]
    fn test_partial_failures_are_counted_per_item() {
        let backend = FakeIndex::new();
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener);
        bulk.start();
        bulk.add(sample_doc("I1")).unwrap();
        bulk.add(sample_doc("I2")).unwrap();
        let result = bulk.stop().unwrap();
        assert_eq!(result.total, 2);

        backend.lock_writes();
        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener);
        bulk.start();
        bulk.add(sample_doc("I3")).unwrap();
        let result = bulk.stop().unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.failures, 1);
    }

    #[test]
    fn test_point_and_field_deletions() {
        let backend = FakeIndex::new();
        for key in ["I1", "I2", "I3"] {
            backend.put(sample_doc(key));
        }

        let mut listener = NoopListener;
        let mut bulk = BulkSynchronizer::new(&backend, &mut listener);
        bulk.start();
        bulk.add_deletion(Deletion::Doc(DocRef::new("I1", "P1")))
            .unwrap();
        bulk.add_deletion(Deletion::ByField {
            field: ScopeField::Branch,
            value: "B1".to_string(),
            routing: "P1".to_string(),
        })
        .unwrap();
        let result = bulk.stop().unwrap();

        assert!(result.is_success());
        assert_eq!(backend.doc_count(), 0);
    }
}
