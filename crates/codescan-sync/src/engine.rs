//! Engine facade tying reader, router, queue and bulk synchronizer
//! together.
//!
//! Synchronization passes run here: group pending recovery items by their
//! doc-id type, re-read current relational truth for each group, apply the
//! resulting documents or deletions, and let the listeners reconcile the
//! queue from per-item outcomes. Passes are safe to repeat and safe to
//! interrupt between groups.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use codescan_search::{IndexBackend, ScopeField};
use codescan_store::{branch_exists, Store};
use codescan_types::{
    BranchEvent, BranchRef, ChangeEvent, DocIdType, DocRef, EntityEvent, RecoveryItem,
    SyncSettings,
};

use crate::bulk::{BulkSynchronizer, Deletion};
use crate::cascade::DeletionCascade;
use crate::error::SyncError;
use crate::listener::{IndexingListener, NoopListener, QueueListener};
use crate::reader::{self, MAX_KEY_PARTITION};
use crate::result::IndexingResult;
use crate::router;

/// The index synchronization engine.
pub struct SyncEngine {
    store: Arc<Store>,
    backend: Arc<dyn IndexBackend>,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(store: Arc<Store>, backend: Arc<dyn IndexBackend>, settings: SyncSettings) -> Self {
        Self {
            store,
            backend,
            settings,
        }
    }

    fn bulk<'a>(&'a self, listener: &'a mut dyn IndexingListener) -> BulkSynchronizer<'a> {
        BulkSynchronizer::new(self.backend.as_ref(), listener)
            .with_max_batch_size(self.settings.max_batch_size)
    }

    /// Rebuild the whole index from relational truth.
    ///
    /// No recovery items are involved: a failed rebuild is repeated
    /// wholesale by the caller.
    pub fn index_all(&self) -> Result<IndexingResult, SyncError> {
        let session = self.store.read_session()?;
        let mut listener = NoopListener;
        let mut bulk = self.bulk(&mut listener);
        bulk.start();

        let mut cursor = reader::read_all(&session);
        for doc in &mut cursor {
            bulk.add(doc?)?;
        }
        let result = bulk.stop()?;

        info!(
            total = result.total,
            failures = result.failures,
            skipped = cursor.skipped(),
            "Indexed all issues"
        );
        Ok(result)
    }

    /// Index every issue of one branch after an analysis.
    ///
    /// Analysis-time indexing has its own retry at the analysis level, so
    /// failures raise [`SyncError::Unrecoverable`] instead of enqueueing
    /// recovery items. Existing documents of other scopes are untouched.
    pub fn index_branch(&self, branch_uuid: &str) -> Result<IndexingResult, SyncError> {
        let session = self.store.read_session()?;
        let mut listener = NoopListener;
        let mut bulk = self.bulk(&mut listener);
        bulk.start();

        let mut cursor = reader::read_for_branch(&session, branch_uuid);
        for doc in &mut cursor {
            bulk.add(doc?)?;
        }
        let result = bulk.stop()?;

        if result.is_success() {
            info!(branch = branch_uuid, total = result.total, "Indexed branch");
            Ok(result)
        } else {
            Err(SyncError::Unrecoverable {
                failures: result.failures,
                total: result.total,
            })
        }
    }

    /// Route an entity event and persist the resulting recovery items.
    ///
    /// Must be called only once the relational mutation is durably visible;
    /// the returned items can then be processed immediately or left to a
    /// sweep.
    pub fn prepare_for_recovery_on_entity_event(
        &self,
        entity_uuids: &[String],
        event: EntityEvent,
    ) -> Result<Vec<RecoveryItem>, SyncError> {
        let items = router::route(&ChangeEvent::entity(event, entity_uuids.to_vec()));
        self.store.insert_recovery_items(&items)?;
        Ok(items)
    }

    /// Route a branch event and persist the resulting recovery items.
    pub fn prepare_for_recovery_on_branch_event(
        &self,
        branches: &[BranchRef],
        event: BranchEvent,
    ) -> Result<Vec<RecoveryItem>, SyncError> {
        let items = router::route(&ChangeEvent::branch(event, branches.to_vec()));
        self.store.insert_recovery_items(&items)?;
        Ok(items)
    }

    /// Persist recovery items for the given issues, then process them in
    /// the same call.
    ///
    /// The items are durable before any index write happens, so a crash
    /// mid-call leaves recoverable state for the next sweep.
    pub fn commit_and_synchronize(&self, issues: &[DocRef]) -> Result<IndexingResult, SyncError> {
        let items: Vec<RecoveryItem> = issues
            .iter()
            .map(|r| RecoveryItem::for_issue(r.id.clone(), r.routing.clone()))
            .collect();
        self.store.insert_recovery_items(&items)?;
        self.index_items(&items)
    }

    /// Process recovery items, grouped by doc-id type.
    pub fn index_items(&self, items: &[RecoveryItem]) -> Result<IndexingResult, SyncError> {
        let mut issue_items = Vec::new();
        let mut branch_items = Vec::new();
        let mut project_items = Vec::new();
        for item in items {
            match item.doc_id_type {
                DocIdType::IssueKey => issue_items.push(item.clone()),
                DocIdType::BranchUuid => branch_items.push(item.clone()),
                DocIdType::DeleteProjectUuid => project_items.push(item.clone()),
            }
        }

        let mut result = IndexingResult::new();
        if !issue_items.is_empty() {
            result.merge(&self.index_issue_items(&issue_items)?);
        }
        for item in &branch_items {
            result.merge(&self.index_branch_item(item)?);
        }
        for item in &project_items {
            result.merge(&self.delete_project_item(item)?);
        }

        debug!(
            items = items.len(),
            total = result.total,
            failures = result.failures,
            "Processed recovery items"
        );
        Ok(result)
    }

    /// One-to-one resolution: each item maps to one present or absent
    /// document. Absent rows turn into point deletes.
    fn index_issue_items(&self, items: &[RecoveryItem]) -> Result<IndexingResult, SyncError> {
        let session = self.store.read_session()?;
        let mut total = IndexingResult::new();

        for chunk in items.chunks(MAX_KEY_PARTITION) {
            let keys: Vec<String> = chunk.iter().map(|i| i.doc_id.clone()).collect();
            let mut absent: HashMap<String, RecoveryItem> = chunk
                .iter()
                .map(|i| (i.doc_id.clone(), i.clone()))
                .collect();

            let mut listener = QueueListener::one_to_one(&self.store, chunk.to_vec());
            let mut bulk = self.bulk(&mut listener);
            bulk.start();

            let mut cursor = reader::read_for_keys(&session, &keys)?;
            for doc in &mut cursor {
                let doc = doc?;
                absent.remove(&doc.key);
                bulk.add(doc)?;
            }
            for (key, item) in absent {
                bulk.add_deletion(Deletion::Doc(DocRef::new(key, item.routing)))?;
            }

            total.merge(&bulk.stop()?);
        }
        Ok(total)
    }

    /// One-to-many resolution of one branch scope: re-write every document
    /// of the branch, or clear the scope when the read comes back empty.
    fn index_branch_item(&self, item: &RecoveryItem) -> Result<IndexingResult, SyncError> {
        let session = self.store.read_session()?;
        let mut listener = QueueListener::one_to_many(&self.store, vec![item.clone()]);
        let mut bulk = self.bulk(&mut listener);
        bulk.start();

        let mut wrote_any = false;
        let mut cursor = reader::read_for_branch(&session, &item.doc_id);
        for doc in &mut cursor {
            bulk.add(doc?)?;
            wrote_any = true;
        }

        if !wrote_any {
            // Items are enqueued only after the relational change is
            // visible, so an empty read means the scope's documents must
            // go. branch_exists only distinguishes the two shapes of gone:
            // a deleted branch vs a branch left without issues.
            if branch_exists(session.conn(), &item.doc_id)? {
                debug!(branch = %item.doc_id, "Branch has no issues left, clearing its documents");
            } else {
                debug!(branch = %item.doc_id, "Branch is gone, clearing its documents");
            }
            bulk.add_deletion(Deletion::ByField {
                field: ScopeField::Branch,
                value: item.doc_id.clone(),
                routing: item.routing.clone(),
            })?;
        }

        bulk.stop()
    }

    /// One-to-many resolution of one deleted project: a routing-scoped
    /// delete.
    fn delete_project_item(&self, item: &RecoveryItem) -> Result<IndexingResult, SyncError> {
        let mut listener = QueueListener::one_to_many(&self.store, vec![item.clone()]);
        let mut bulk = self.bulk(&mut listener);
        bulk.start();
        bulk.add_deletion(Deletion::ByField {
            field: ScopeField::Project,
            value: item.doc_id.clone(),
            routing: item.routing.clone(),
        })?;
        bulk.stop()
    }

    /// Process pending recovery items inserted at or before `cutoff`.
    pub fn sweep_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<IndexingResult, SyncError> {
        let items = self.store.fetch_pending(cutoff, limit)?;
        if items.is_empty() {
            return Ok(IndexingResult::new());
        }
        info!(count = items.len(), "Recovering pending index items");
        self.index_items(&items)
    }

    /// One sweep pass over items old enough to have left the synchronous
    /// path's grace window.
    pub fn sweep(&self) -> Result<IndexingResult, SyncError> {
        let cutoff = Utc::now() - Duration::seconds(self.settings.sweep.grace_secs as i64);
        self.sweep_before(cutoff, self.settings.sweep.batch_size)
    }

    /// Synchronous deletes that bypass the queue entirely.
    pub fn cascade(&self) -> DeletionCascade<'_> {
        DeletionCascade::new(self.backend.as_ref())
    }

    /// Delete the given issue keys now, failing loudly on any failure.
    pub fn delete_by_keys(&self, routing: &str, keys: &[String]) -> Result<IndexingResult, SyncError> {
        self.cascade().delete_by_keys(routing, keys)
    }
}
