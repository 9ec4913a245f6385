//! In-memory backend for tests.
//!
//! Supports the two failure modes the engine has to survive: a locked
//! (read-only) index where every item fails individually, and an
//! unreachable backend where the whole batch errors.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use codescan_types::{DocRef, IssueDoc};

use crate::backend::{DocOutcome, IndexBackend, ScopeField};
use crate::error::SearchError;

#[derive(Default)]
struct FakeState {
    docs: BTreeMap<String, IssueDoc>,
    locked: bool,
    unavailable: bool,
    failing_keys: BTreeSet<String>,
}

/// In-memory document store with failure injection.
#[derive(Default)]
pub struct FakeIndex {
    state: Mutex<FakeState>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent item fail, as a read-only index would.
    pub fn lock_writes(&self) {
        self.state.lock().unwrap().locked = true;
    }

    pub fn unlock_writes(&self) {
        self.state.lock().unwrap().locked = false;
    }

    /// Make every subsequent batch fail at transport level.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Make writes and deletes of one specific key fail, as backend-side
    /// validation of a single document would.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.state.lock().unwrap().failing_keys.insert(key.into());
    }

    pub fn heal_key(&self, key: &str) {
        self.state.lock().unwrap().failing_keys.remove(key);
    }

    pub fn doc_count(&self) -> usize {
        self.state.lock().unwrap().docs.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().docs.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<IssueDoc> {
        self.state.lock().unwrap().docs.get(key).cloned()
    }

    pub fn docs(&self) -> Vec<IssueDoc> {
        self.state.lock().unwrap().docs.values().cloned().collect()
    }

    /// Seed a document directly, bypassing outcome accounting.
    pub fn put(&self, doc: IssueDoc) {
        self.state
            .lock()
            .unwrap()
            .docs
            .insert(doc.key.clone(), doc);
    }

    fn check_transport(state: &FakeState) -> Result<(), SearchError> {
        if state.unavailable {
            Err(SearchError::Unavailable("fake backend is down".to_string()))
        } else {
            Ok(())
        }
    }
}

impl IndexBackend for FakeIndex {
    fn write(&self, docs: &[IssueDoc]) -> Result<Vec<DocOutcome>, SearchError> {
        let mut state = self.state.lock().unwrap();
        Self::check_transport(&state)?;

        let mut outcomes = Vec::with_capacity(docs.len());
        for doc in docs {
            if state.locked || state.failing_keys.contains(&doc.key) {
                outcomes.push(DocOutcome::failed(doc.doc_ref()));
            } else {
                state.docs.insert(doc.key.clone(), doc.clone());
                outcomes.push(DocOutcome::ok(doc.doc_ref()));
            }
        }
        Ok(outcomes)
    }

    fn delete(&self, refs: &[DocRef]) -> Result<Vec<DocOutcome>, SearchError> {
        let mut state = self.state.lock().unwrap();
        Self::check_transport(&state)?;

        let mut outcomes = Vec::with_capacity(refs.len());
        for doc_ref in refs {
            if state.locked || state.failing_keys.contains(&doc_ref.id) {
                outcomes.push(DocOutcome::failed(doc_ref.clone()));
            } else {
                state.docs.remove(&doc_ref.id);
                outcomes.push(DocOutcome::ok(doc_ref.clone()));
            }
        }
        Ok(outcomes)
    }

    fn delete_by_field(
        &self,
        field: ScopeField,
        value: &str,
        routing: &str,
    ) -> Result<DocOutcome, SearchError> {
        let mut state = self.state.lock().unwrap();
        Self::check_transport(&state)?;

        let doc_ref = DocRef::new(value, routing);
        if state.locked {
            return Ok(DocOutcome::failed(doc_ref));
        }

        state.docs.retain(|_, doc| match field {
            ScopeField::Branch => doc.branch_uuid != value,
            ScopeField::Project => doc.project_uuid != value,
        });
        Ok(DocOutcome::ok(doc_ref))
    }

    fn flush(&self) -> Result<(), SearchError> {
        Ok(())
    }
}
