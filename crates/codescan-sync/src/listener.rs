//! Listeners reconciling the recovery queue from per-item outcomes.
//!
//! A queue item is deleted only once the index work it describes has
//! succeeded; anything else leaves the item in place for a later sweep.
//! Queue mutations themselves are best-effort: a failed delete keeps the
//! item queued, which at-least-once consumers already tolerate.

use std::collections::HashMap;

use tracing::{debug, warn};

use codescan_store::Store;
use codescan_types::{DocRef, RecoveryItem};

use crate::result::IndexingResult;

/// Consumer of bulk synchronization outcomes.
pub trait IndexingListener {
    /// Called as document requests are confirmed applied.
    fn on_success(&mut self, refs: &[DocRef]);

    /// Called once when the bulk run stops, with the accumulated result.
    fn on_finish(&mut self, result: &IndexingResult);
}

/// Listener that does nothing, for runs without recovery semantics.
pub struct NoopListener;

impl IndexingListener for NoopListener {
    fn on_success(&mut self, _refs: &[DocRef]) {}

    fn on_finish(&mut self, _result: &IndexingResult) {}
}

/// How queue items map to document outcomes.
pub enum Resolution {
    /// Each item corresponds to exactly one document; resolve items as
    /// their document succeeds.
    OneToOne(HashMap<String, RecoveryItem>),
    /// Each item corresponds to zero-or-more documents; resolve all items
    /// only when the whole run finished without failures.
    OneToMany(Vec<RecoveryItem>),
}

/// Listener that resolves recovery queue items.
pub struct QueueListener<'a> {
    store: &'a Store,
    resolution: Resolution,
}

impl<'a> QueueListener<'a> {
    pub fn one_to_one(store: &'a Store, items: Vec<RecoveryItem>) -> Self {
        let by_doc = items
            .into_iter()
            .map(|item| (item.doc_id.clone(), item))
            .collect();
        Self {
            store,
            resolution: Resolution::OneToOne(by_doc),
        }
    }

    pub fn one_to_many(store: &'a Store, items: Vec<RecoveryItem>) -> Self {
        Self {
            store,
            resolution: Resolution::OneToMany(items),
        }
    }

    fn delete_items(&self, items: &[RecoveryItem]) {
        if items.is_empty() {
            return;
        }
        match self.store.delete_recovery_items(items) {
            Ok(deleted) => debug!(resolved = items.len(), deleted, "Resolved recovery items"),
            // items stay queued; the next sweep retries them
            Err(e) => warn!(error = %e, "Failed to delete resolved recovery items"),
        }
    }
}

impl IndexingListener for QueueListener<'_> {
    fn on_success(&mut self, refs: &[DocRef]) {
        if let Resolution::OneToOne(by_doc) = &mut self.resolution {
            let resolved: Vec<RecoveryItem> = refs
                .iter()
                .filter_map(|r| by_doc.remove(&r.id))
                .collect();
            self.delete_items(&resolved);
        }
    }

    fn on_finish(&mut self, result: &IndexingResult) {
        if let Resolution::OneToMany(items) = &mut self.resolution {
            if result.is_success() {
                let items = std::mem::take(items);
                self.delete_items(&items);
            } else {
                debug!(
                    failures = result.failures,
                    pending = items.len(),
                    "Run had failures, keeping scope items queued"
                );
            }
        }
    }
}
