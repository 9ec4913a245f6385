//! Document reader: lazily materializes index documents from relational
//! truth.
//!
//! A cursor runs one forward-only scan over its read session, paged by
//! rowid so no statement stays open between pages. Dropping the cursor (or
//! the session) at any point releases the scan. A malformed record fails
//! only itself: it is skipped and reported, never aborting the scan.

use std::collections::VecDeque;

use chrono::DateTime;
use tracing::warn;

use codescan_store::{select_issue_page, ReadSession, ScanScope, ScannedRow};
use codescan_types::{split_security_standards, Impact, IssueDoc};

use crate::error::SyncError;

/// Maximum keys one `read_for_keys` partition accepts. Callers own the
/// chunking above this size.
pub const MAX_KEY_PARTITION: usize = 1000;

/// Rows fetched per page of a scan.
const PAGE_SIZE: usize = 200;

/// Lazy, finite, forward-only cursor of index documents.
pub struct DocCursor<'s> {
    session: &'s ReadSession,
    scope: ScanScope,
    buffer: VecDeque<IssueDoc>,
    last_rowid: i64,
    done: bool,
    skipped: u64,
}

impl<'s> DocCursor<'s> {
    fn new(session: &'s ReadSession, scope: ScanScope) -> Self {
        Self {
            session,
            scope,
            buffer: VecDeque::new(),
            last_rowid: 0,
            done: false,
            skipped: 0,
        }
    }

    /// Number of records skipped so far because they could not be
    /// materialized.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn fill(&mut self) -> Result<(), SyncError> {
        let page = select_issue_page(self.session.conn(), &self.scope, self.last_rowid, PAGE_SIZE)?;
        if page.len() < PAGE_SIZE {
            self.done = true;
        }
        if let Some(last) = page.last() {
            self.last_rowid = last.rowid;
        }
        for row in page {
            match row_to_doc(row) {
                Some(doc) => self.buffer.push_back(doc),
                None => self.skipped += 1,
            }
        }
        Ok(())
    }
}

impl Iterator for DocCursor<'_> {
    type Item = Result<IssueDoc, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                return Some(Ok(doc));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

/// Materialize one scanned row, or skip it.
///
/// Skips rows with an empty routing key (upstream data-integrity fault)
/// and rows whose impact payload cannot be decoded.
fn row_to_doc(row: ScannedRow) -> Option<IssueDoc> {
    if row.project_uuid.is_empty() {
        warn!(key = %row.kee, "Issue row has no routing key, skipping");
        return None;
    }

    let impacts = match &row.impacts {
        Some(bytes) => match Impact::decode_list(bytes) {
            Ok(impacts) => impacts,
            Err(e) => {
                warn!(key = %row.kee, error = %e, "Malformed impacts payload, skipping record");
                return None;
            }
        },
        None => Vec::new(),
    };

    let split_csv = |value: &Option<String>| -> Vec<String> {
        value
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    };

    let standards_raw = split_csv(&row.security_standards);
    let standards = split_security_standards(standards_raw.iter().map(|s| s.as_str()));

    Some(IssueDoc {
        key: row.kee,
        component_uuid: row.component_uuid,
        project_uuid: row.project_uuid,
        branch_uuid: row.branch_uuid,
        is_main_branch: row.is_main_branch,
        rule_key: row.rule_key,
        severity: row.severity,
        status: row.status,
        resolution: row.resolution,
        language: row.language,
        line: row.line.and_then(|l| u32::try_from(l).ok()),
        effort: row.effort,
        tags: split_csv(&row.tags),
        created_at: DateTime::from_timestamp_millis(row.created_at).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_millis(row.updated_at).unwrap_or_default(),
        closed_at: row.closed_at.and_then(DateTime::from_timestamp_millis),
        cwe: standards.cwe,
        owasp_top10: standards.owasp_top10,
        owasp_asvs_40: standards.owasp_asvs_40,
        sans_top25: standards.sans_top25,
        sq_category: standards.sq_category,
        vulnerability_probability: standards.vulnerability_probability,
        impacts,
    })
}

/// Read the documents of specific issue keys.
///
/// Key sets larger than [`MAX_KEY_PARTITION`] are rejected up front; the
/// caller is responsible for chunking.
pub fn read_for_keys<'s>(
    session: &'s ReadSession,
    keys: &[String],
) -> Result<DocCursor<'s>, SyncError> {
    if keys.len() > MAX_KEY_PARTITION {
        return Err(SyncError::TooManyKeys {
            count: keys.len(),
            max: MAX_KEY_PARTITION,
        });
    }
    Ok(DocCursor::new(session, ScanScope::Keys(keys.to_vec())))
}

/// Read every document of one branch.
pub fn read_for_branch<'s>(session: &'s ReadSession, branch_uuid: &str) -> DocCursor<'s> {
    DocCursor::new(session, ScanScope::Branch(branch_uuid.to_string()))
}

/// Read every document.
pub fn read_all(session: &ReadSession) -> DocCursor<'_> {
    DocCursor::new(session, ScanScope::All)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codescan_store::{BranchRow, IssueRow, Store};
    use codescan_types::SecurityCategory;
    use tempfile::TempDir;

    fn open_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("db.sqlite")).unwrap();
        store
            .insert_branch(&BranchRow::new("B1", "P1", "main").main())
            .unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_read_all_materializes_documents() {
        let (store, _temp) = open_store();
        store
            .insert_issue(
                &IssueRow::new("I1", "B1", "P1")
                    .with_security_standards(vec!["cwe:89".to_string()]),
            )
            .unwrap();

        let session = store.read_session().unwrap();
        let docs: Vec<IssueDoc> = read_all(&session).map(|d| d.unwrap()).collect();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key, "I1");
        assert!(docs[0].is_main_branch);
        assert_eq!(docs[0].sq_category, SecurityCategory::SqlInjection);
    }

    #[test]
    fn test_read_for_keys_rejects_oversized_partition() {
        let (store, _temp) = open_store();
        let session = store.read_session().unwrap();

        let keys: Vec<String> = (0..=MAX_KEY_PARTITION).map(|i| format!("I{}", i)).collect();
        let result = read_for_keys(&session, &keys);
        assert!(matches!(
            result,
            Err(SyncError::TooManyKeys { count, max })
                if count == MAX_KEY_PARTITION + 1 && max == MAX_KEY_PARTITION
        ));
    }

    #[test]
    fn test_read_for_keys_exactly_at_limit_is_accepted() {
        let (store, _temp) = open_store();
        let session = store.read_session().unwrap();

        let keys: Vec<String> = (0..MAX_KEY_PARTITION).map(|i| format!("I{}", i)).collect();
        assert!(read_for_keys(&session, &keys).is_ok());
    }

    #[test]
    fn test_malformed_impacts_skips_only_that_record() {
        let (store, _temp) = open_store();
        store.insert_issue(&IssueRow::new("I1", "B1", "P1")).unwrap();
        store.insert_issue(&IssueRow::new("I2", "B1", "P1")).unwrap();

        // corrupt one payload underneath the typed API
        let conn = rusqlite::Connection::open(store.path()).unwrap();
        conn.execute(
            "UPDATE issues SET impacts = X'DEADBEEF' WHERE kee = 'I1'",
            [],
        )
        .unwrap();

        let session = store.read_session().unwrap();
        let mut cursor = read_all(&session);
        let docs: Vec<IssueDoc> = (&mut cursor).map(|d| d.unwrap()).collect();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key, "I2");
        assert_eq!(cursor.skipped(), 1);
    }

    #[test]
    fn test_row_without_routing_key_is_skipped() {
        let (store, _temp) = open_store();
        store.insert_issue(&IssueRow::new("I1", "B1", "")).unwrap();
        store.insert_issue(&IssueRow::new("I2", "B1", "P1")).unwrap();

        let session = store.read_session().unwrap();
        let mut cursor = read_all(&session);
        let docs: Vec<IssueDoc> = (&mut cursor).map(|d| d.unwrap()).collect();

        assert_eq!(docs.len(), 1);
        assert!(docs.iter().all(|d| !d.project_uuid.is_empty()));
        assert_eq!(cursor.skipped(), 1);
    }

    #[test]
    fn test_cursor_can_be_abandoned_early() {
        let (store, _temp) = open_store();
        for i in 0..10 {
            store
                .insert_issue(&IssueRow::new(format!("I{}", i), "B1", "P1"))
                .unwrap();
        }

        let session = store.read_session().unwrap();
        {
            let mut cursor = read_all(&session);
            let _first = cursor.next().unwrap().unwrap();
            // dropped here, mid-scan
        }

        // the session is still usable for a fresh scan
        let docs: Vec<IssueDoc> = read_all(&session).map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 10);
    }

    #[test]
    fn test_scan_pages_through_large_sets() {
        let (store, _temp) = open_store();
        let count = PAGE_SIZE + 7;
        for _ in 0..count {
            let key = ulid::Ulid::new().to_string();
            store
                .insert_issue(&IssueRow::new(key, "B1", "P1"))
                .unwrap();
        }

        let session = store.read_session().unwrap();
        let docs: Vec<IssueDoc> = read_all(&session).map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), count);
    }
}
