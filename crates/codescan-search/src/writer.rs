//! Tantivy implementation of the backend port.
//!
//! Point writes are delete-term + add-document so re-indexing a key always
//! replaces the previous document. Scoped deletes are term deletes on the
//! branch/project fields. Changes become visible on `flush`.

use std::sync::{Arc, Mutex};

use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{IndexReader, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use codescan_types::{DocRef, IssueDoc};

use crate::backend::{DocOutcome, IndexBackend, ScopeField};
use crate::error::SearchError;
use crate::index::IssueIndex;
use crate::schema::IssueSchema;

/// Backend adapter writing issue documents into a Tantivy index.
pub struct TantivyBackend {
    writer: Arc<Mutex<IndexWriter>>,
    reader: IndexReader,
    schema: IssueSchema,
}

impl TantivyBackend {
    /// Create a backend from an issue index.
    pub fn new(index: &IssueIndex) -> Result<Self, SearchError> {
        let writer = index.writer()?;
        let reader = index.reader()?;
        let schema = index.schema().clone();

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader,
            schema,
        })
    }

    fn scope_field(&self, field: ScopeField) -> tantivy::schema::Field {
        match field {
            ScopeField::Branch => self.schema.branch_uuid,
            ScopeField::Project => self.schema.project_uuid,
        }
    }

    fn to_doc(&self, issue: &IssueDoc) -> Result<TantivyDocument, SearchError> {
        let payload = serde_json::to_string(issue)
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let mut doc = TantivyDocument::default();
        doc.add_text(self.schema.key, &issue.key);
        doc.add_text(self.schema.project_uuid, &issue.project_uuid);
        doc.add_text(self.schema.branch_uuid, &issue.branch_uuid);
        doc.add_text(
            self.schema.is_main_branch,
            if issue.is_main_branch { "true" } else { "false" },
        );
        doc.add_text(self.schema.rule_key, &issue.rule_key);
        doc.add_text(self.schema.severity, &issue.severity);
        doc.add_text(self.schema.status, &issue.status);
        doc.add_text(self.schema.payload, &payload);
        Ok(doc)
    }

    fn decode_payload(&self, doc: &TantivyDocument) -> Result<IssueDoc, SearchError> {
        let payload = doc
            .get_first(self.schema.payload)
            .and_then(|v| v.as_str())
            .ok_or_else(|| SearchError::Decode("document has no payload".to_string()))?;
        serde_json::from_str(payload).map_err(|e| SearchError::Decode(e.to_string()))
    }

    /// Number of live documents in the index.
    pub fn doc_count(&self) -> Result<u64, SearchError> {
        let searcher = self.reader.searcher();
        Ok(searcher
            .segment_readers()
            .iter()
            .map(|r| r.num_docs() as u64)
            .sum())
    }

    /// Fetch every stored document, for verification and rebuild checks.
    pub fn fetch_all(&self) -> Result<Vec<IssueDoc>, SearchError> {
        let searcher = self.reader.searcher();
        let limit = (self.doc_count()? as usize).max(1);
        let top_docs = searcher.search(&AllQuery, &TopDocs::with_limit(limit))?;

        let mut docs = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            docs.push(self.decode_payload(&doc)?);
        }
        Ok(docs)
    }

    /// Fetch one document by issue key.
    pub fn fetch_by_key(&self, key: &str) -> Result<Option<IssueDoc>, SearchError> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.schema.key, key);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;

        match top_docs.first() {
            Some((_score, doc_address)) => {
                let doc: TantivyDocument = searcher.doc(*doc_address)?;
                Ok(Some(self.decode_payload(&doc)?))
            }
            None => Ok(None),
        }
    }

    /// Keys of every live document.
    pub fn keys(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.fetch_all()?.into_iter().map(|d| d.key).collect())
    }
}

impl IndexBackend for TantivyBackend {
    fn write(&self, docs: &[IssueDoc]) -> Result<Vec<DocOutcome>, SearchError> {
        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(docs.len());
        for issue in docs {
            let doc_ref = issue.doc_ref();
            let doc = match self.to_doc(issue) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(key = %issue.key, error = %e, "Failed to encode document");
                    outcomes.push(DocOutcome::failed(doc_ref));
                    continue;
                }
            };

            writer.delete_term(Term::from_field_text(self.schema.key, &issue.key));
            match writer.add_document(doc) {
                Ok(_) => outcomes.push(DocOutcome::ok(doc_ref)),
                Err(e) => {
                    warn!(key = %issue.key, error = %e, "Failed to index document");
                    outcomes.push(DocOutcome::failed(doc_ref));
                }
            }
        }

        debug!(count = docs.len(), "Applied document batch");
        Ok(outcomes)
    }

    fn delete(&self, refs: &[DocRef]) -> Result<Vec<DocOutcome>, SearchError> {
        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(refs.len());
        for doc_ref in refs {
            writer.delete_term(Term::from_field_text(self.schema.key, &doc_ref.id));
            outcomes.push(DocOutcome::ok(doc_ref.clone()));
        }

        debug!(count = refs.len(), "Applied delete batch");
        Ok(outcomes)
    }

    fn delete_by_field(
        &self,
        field: ScopeField,
        value: &str,
        routing: &str,
    ) -> Result<DocOutcome, SearchError> {
        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        writer.delete_term(Term::from_field_text(self.scope_field(field), value));
        info!(field = field.as_str(), value = %value, routing = %routing, "Deleted documents by field");
        Ok(DocOutcome::ok(DocRef::new(value, routing)))
    }

    fn flush(&self) -> Result<(), SearchError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        let opstamp = writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        debug!(opstamp, "Committed index changes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IssueIndexConfig;
    use chrono::Utc;
    use codescan_types::{SecurityCategory, VulnerabilityProbability};
    use tempfile::TempDir;

    fn sample_doc(key: &str, branch_uuid: &str, project_uuid: &str) -> IssueDoc {
        IssueDoc {
            key: key.to_string(),
            component_uuid: "C1".to_string(),
            project_uuid: project_uuid.to_string(),
            branch_uuid: branch_uuid.to_string(),
            is_main_branch: true,
            rule_key: "repo:rule".to_string(),
            severity: "MAJOR".to_string(),
            status: "OPEN".to_string(),
            resolution: None,
            language: Some("java".to_string()),
            line: Some(42),
            effort: Some(5),
            tags: vec!["pitfall".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
            cwe: vec!["unknown".to_string()],
            owasp_top10: vec![],
            owasp_asvs_40: vec![],
            sans_top25: vec![],
            sq_category: SecurityCategory::Others,
            vulnerability_probability: VulnerabilityProbability::Low,
            impacts: vec![],
        }
    }

    fn open_backend() -> (TantivyBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let index =
            IssueIndex::open_or_create(IssueIndexConfig::new(temp_dir.path()).with_memory_mb(15))
                .unwrap();
        (TantivyBackend::new(&index).unwrap(), temp_dir)
    }

    #[test]
    fn test_write_and_fetch() {
        let (backend, _temp) = open_backend();

        let outcomes = backend
            .write(&[sample_doc("I1", "B1", "P1"), sample_doc("I2", "B1", "P1")])
            .unwrap();
        assert!(outcomes.iter().all(|o| o.success));
        backend.flush().unwrap();

        assert_eq!(backend.doc_count().unwrap(), 2);
        let fetched = backend.fetch_by_key("I1").unwrap().unwrap();
        assert_eq!(fetched.key, "I1");
        assert_eq!(fetched.project_uuid, "P1");
        assert!(fetched.is_main_branch);
    }

    #[test]
    fn test_rewrite_replaces_document() {
        let (backend, _temp) = open_backend();

        backend.write(&[sample_doc("I1", "B1", "P1")]).unwrap();
        backend.flush().unwrap();

        let mut updated = sample_doc("I1", "B1", "P1");
        updated.status = "RESOLVED".to_string();
        backend.write(&[updated]).unwrap();
        backend.flush().unwrap();

        assert_eq!(backend.doc_count().unwrap(), 1);
        let fetched = backend.fetch_by_key("I1").unwrap().unwrap();
        assert_eq!(fetched.status, "RESOLVED");
    }

    #[test]
    fn test_point_delete() {
        let (backend, _temp) = open_backend();

        backend
            .write(&[sample_doc("I1", "B1", "P1"), sample_doc("I2", "B1", "P1")])
            .unwrap();
        backend.flush().unwrap();

        backend.delete(&[DocRef::new("I1", "P1")]).unwrap();
        backend.flush().unwrap();

        assert_eq!(backend.keys().unwrap(), vec!["I2".to_string()]);
    }

    #[test]
    fn test_delete_by_branch_field() {
        let (backend, _temp) = open_backend();

        backend
            .write(&[
                sample_doc("I1", "B1", "P1"),
                sample_doc("I2", "B1", "P1"),
                sample_doc("I3", "B2", "P1"),
            ])
            .unwrap();
        backend.flush().unwrap();

        backend
            .delete_by_field(ScopeField::Branch, "B1", "P1")
            .unwrap();
        backend.flush().unwrap();

        assert_eq!(backend.keys().unwrap(), vec!["I3".to_string()]);
    }

    #[test]
    fn test_delete_by_project_field() {
        let (backend, _temp) = open_backend();

        backend
            .write(&[sample_doc("I1", "B1", "P1"), sample_doc("I2", "B2", "P2")])
            .unwrap();
        backend.flush().unwrap();

        backend
            .delete_by_field(ScopeField::Project, "P1", "P1")
            .unwrap();
        backend.flush().unwrap();

        assert_eq!(backend.keys().unwrap(), vec!["I2".to_string()]);
    }
}
