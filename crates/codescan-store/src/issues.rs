//! Issue and branch rows: relational writes plus the paged scan queries
//! that feed the document reader.
//!
//! Scan queries are keyset-paged over `rowid` so a reader never holds a
//! statement open across pages; the read session can be dropped between
//! any two pages.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Connection;

use codescan_types::Impact;

use crate::db::Store;
use crate::error::StoreError;

/// One branch row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRow {
    pub uuid: String,
    pub project_uuid: String,
    pub kee: String,
    pub is_main: bool,
}

impl BranchRow {
    pub fn new(
        uuid: impl Into<String>,
        project_uuid: impl Into<String>,
        kee: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            project_uuid: project_uuid.into(),
            kee: kee.into(),
            is_main: false,
        }
    }

    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }
}

/// One issue row as written by the relational side.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub kee: String,
    pub component_uuid: String,
    pub branch_uuid: String,
    pub project_uuid: String,
    pub rule_key: String,
    pub severity: String,
    pub status: String,
    pub resolution: Option<String>,
    pub language: Option<String>,
    pub line: Option<u32>,
    pub effort: Option<i64>,
    pub tags: Vec<String>,
    pub security_standards: Vec<String>,
    pub impacts: Vec<Impact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl IssueRow {
    pub fn new(
        kee: impl Into<String>,
        branch_uuid: impl Into<String>,
        project_uuid: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            kee: kee.into(),
            component_uuid: String::new(),
            branch_uuid: branch_uuid.into(),
            project_uuid: project_uuid.into(),
            rule_key: "repo:rule".to_string(),
            severity: "MAJOR".to_string(),
            status: "OPEN".to_string(),
            resolution: None,
            language: None,
            line: None,
            effort: None,
            tags: Vec::new(),
            security_standards: Vec::new(),
            impacts: Vec::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn with_component(mut self, component_uuid: impl Into<String>) -> Self {
        self.component_uuid = component_uuid.into();
        self
    }

    pub fn with_rule(mut self, rule_key: impl Into<String>) -> Self {
        self.rule_key = rule_key.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_security_standards(mut self, standards: Vec<String>) -> Self {
        self.security_standards = standards;
        self
    }

    pub fn with_impacts(mut self, impacts: Vec<Impact>) -> Self {
        self.impacts = impacts;
        self
    }
}

/// Raw scanned row handed to the document reader.
///
/// Payload columns stay undecoded here; the reader owns the decode step and
/// its skip-on-malformed policy.
#[derive(Debug, Clone)]
pub struct ScannedRow {
    pub rowid: i64,
    pub kee: String,
    pub component_uuid: String,
    pub branch_uuid: String,
    pub project_uuid: String,
    pub is_main_branch: bool,
    pub rule_key: String,
    pub severity: String,
    pub status: String,
    pub resolution: Option<String>,
    pub language: Option<String>,
    pub line: Option<i64>,
    pub effort: Option<i64>,
    pub tags: Option<String>,
    pub security_standards: Option<String>,
    pub impacts: Option<Vec<u8>>,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
}

/// Scope of one scan.
#[derive(Debug, Clone)]
pub enum ScanScope {
    /// Specific issue keys.
    Keys(Vec<String>),
    /// Every issue of one branch.
    Branch(String),
    /// Every issue.
    All,
}

fn join_or_null(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

impl Store {
    /// Insert or replace a branch row.
    pub fn insert_branch(&self, branch: &BranchRow) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO branches (uuid, project_uuid, kee, is_main) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![branch.uuid, branch.project_uuid, branch.kee, branch.is_main],
            )?;
            Ok(())
        })
    }

    /// Flip the main flag of a branch.
    pub fn update_branch_is_main(&self, branch_uuid: &str, is_main: bool) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE branches SET is_main = ?1 WHERE uuid = ?2",
                rusqlite::params![is_main, branch_uuid],
            )?;
            Ok(())
        })
    }

    /// Delete a branch row and all its issues.
    pub fn delete_branch(&self, branch_uuid: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM issues WHERE branch_uuid = ?1",
                rusqlite::params![branch_uuid],
            )?;
            conn.execute(
                "DELETE FROM branches WHERE uuid = ?1",
                rusqlite::params![branch_uuid],
            )?;
            Ok(())
        })
    }

    /// Delete every row of a project (branches and issues).
    pub fn delete_project(&self, project_uuid: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM issues WHERE project_uuid = ?1",
                rusqlite::params![project_uuid],
            )?;
            conn.execute(
                "DELETE FROM branches WHERE project_uuid = ?1",
                rusqlite::params![project_uuid],
            )?;
            Ok(())
        })
    }

    /// Insert or replace an issue row.
    pub fn insert_issue(&self, issue: &IssueRow) -> Result<(), StoreError> {
        let impacts = Impact::encode_list(&issue.impacts)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO issues (kee, component_uuid, branch_uuid, project_uuid, \
                 rule_key, severity, status, resolution, language, line, effort, tags, \
                 security_standards, impacts, created_at, updated_at, closed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                rusqlite::params![
                    issue.kee,
                    issue.component_uuid,
                    issue.branch_uuid,
                    issue.project_uuid,
                    issue.rule_key,
                    issue.severity,
                    issue.status,
                    issue.resolution,
                    issue.language,
                    issue.line,
                    issue.effort,
                    join_or_null(&issue.tags),
                    join_or_null(&issue.security_standards),
                    impacts,
                    issue.created_at.timestamp_millis(),
                    issue.updated_at.timestamp_millis(),
                    issue.closed_at.map(|d| d.timestamp_millis()),
                ],
            )?;
            Ok(())
        })
    }

    /// Delete one issue row.
    pub fn delete_issue(&self, kee: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM issues WHERE kee = ?1", rusqlite::params![kee])?;
            Ok(())
        })
    }

    /// Count issue rows, for assertions and operational checks.
    pub fn issue_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

/// Whether a branch row exists, used to disambiguate "branch has zero
/// issues" from "branch no longer exists".
pub fn branch_exists(conn: &Connection, branch_uuid: &str) -> Result<bool, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM branches WHERE uuid = ?1)",
        rusqlite::params![branch_uuid],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Fetch one page of scanned rows after `after_rowid`, oldest rowid first.
pub fn select_issue_page(
    conn: &Connection,
    scope: &ScanScope,
    after_rowid: i64,
    limit: usize,
) -> Result<Vec<ScannedRow>, StoreError> {
    if matches!(scope, ScanScope::Keys(keys) if keys.is_empty()) {
        return Ok(Vec::new());
    }

    let mut sql = String::from(
        "SELECT i.rowid, i.kee, i.component_uuid, i.branch_uuid, i.project_uuid, \
         COALESCE(b.is_main, 0), i.rule_key, i.severity, i.status, i.resolution, \
         i.language, i.line, i.effort, i.tags, i.security_standards, i.impacts, \
         i.created_at, i.updated_at, i.closed_at \
         FROM issues i LEFT JOIN branches b ON b.uuid = i.branch_uuid \
         WHERE i.rowid > ?",
    );
    let mut params: Vec<Value> = vec![Value::Integer(after_rowid)];

    match scope {
        ScanScope::Keys(keys) => {
            let placeholders = vec!["?"; keys.len()].join(", ");
            sql.push_str(&format!(" AND i.kee IN ({})", placeholders));
            params.extend(keys.iter().map(|k| Value::Text(k.clone())));
        }
        ScanScope::Branch(branch_uuid) => {
            sql.push_str(" AND i.branch_uuid = ?");
            params.push(Value::Text(branch_uuid.clone()));
        }
        ScanScope::All => {}
    }

    sql.push_str(" ORDER BY i.rowid ASC LIMIT ?");
    params.push(Value::Integer(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
        Ok(ScannedRow {
            rowid: row.get(0)?,
            kee: row.get(1)?,
            component_uuid: row.get(2)?,
            branch_uuid: row.get(3)?,
            project_uuid: row.get(4)?,
            is_main_branch: row.get(5)?,
            rule_key: row.get(6)?,
            severity: row.get(7)?,
            status: row.get(8)?,
            resolution: row.get(9)?,
            language: row.get(10)?,
            line: row.get(11)?,
            effort: row.get(12)?,
            tags: row.get(13)?,
            security_standards: row.get(14)?,
            impacts: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
            closed_at: row.get(18)?,
        })
    })?;

    let mut page = Vec::new();
    for row in rows {
        page.push(row?);
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("db.sqlite")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_insert_and_scan_all() {
        let (store, _temp) = open_store();
        store
            .insert_branch(&BranchRow::new("B1", "P1", "main").main())
            .unwrap();
        store.insert_issue(&IssueRow::new("I1", "B1", "P1")).unwrap();
        store.insert_issue(&IssueRow::new("I2", "B1", "P1")).unwrap();

        let session = store.read_session().unwrap();
        let page = select_issue_page(session.conn(), &ScanScope::All, 0, 10).unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].is_main_branch);
        assert_eq!(page[0].project_uuid, "P1");
    }

    #[test]
    fn test_scan_pages_by_rowid() {
        let (store, _temp) = open_store();
        store.insert_branch(&BranchRow::new("B1", "P1", "main")).unwrap();
        for i in 0..5 {
            store
                .insert_issue(&IssueRow::new(format!("I{}", i), "B1", "P1"))
                .unwrap();
        }

        let session = store.read_session().unwrap();
        let first = select_issue_page(session.conn(), &ScanScope::All, 0, 2).unwrap();
        assert_eq!(first.len(), 2);
        let second =
            select_issue_page(session.conn(), &ScanScope::All, first[1].rowid, 2).unwrap();
        assert_eq!(second.len(), 2);
        assert_ne!(first[0].kee, second[0].kee);
    }

    #[test]
    fn test_scan_by_keys_and_branch() {
        let (store, _temp) = open_store();
        store.insert_branch(&BranchRow::new("B1", "P1", "main")).unwrap();
        store.insert_branch(&BranchRow::new("B2", "P1", "feature")).unwrap();
        store.insert_issue(&IssueRow::new("I1", "B1", "P1")).unwrap();
        store.insert_issue(&IssueRow::new("I2", "B2", "P1")).unwrap();

        let session = store.read_session().unwrap();
        let by_key = select_issue_page(
            session.conn(),
            &ScanScope::Keys(vec!["I2".to_string()]),
            0,
            10,
        )
        .unwrap();
        assert_eq!(by_key.len(), 1);
        assert_eq!(by_key[0].kee, "I2");

        let by_branch =
            select_issue_page(session.conn(), &ScanScope::Branch("B1".to_string()), 0, 10).unwrap();
        assert_eq!(by_branch.len(), 1);
        assert_eq!(by_branch[0].kee, "I1");
    }

    #[test]
    fn test_branch_exists() {
        let (store, _temp) = open_store();
        store.insert_branch(&BranchRow::new("B1", "P1", "main")).unwrap();

        let session = store.read_session().unwrap();
        assert!(branch_exists(session.conn(), "B1").unwrap());
        assert!(!branch_exists(session.conn(), "B2").unwrap());
    }

    #[test]
    fn test_delete_branch_removes_issues() {
        let (store, _temp) = open_store();
        store.insert_branch(&BranchRow::new("B1", "P1", "main")).unwrap();
        store.insert_issue(&IssueRow::new("I1", "B1", "P1")).unwrap();

        store.delete_branch("B1").unwrap();

        assert_eq!(store.issue_count().unwrap(), 0);
        let session = store.read_session().unwrap();
        assert!(!branch_exists(session.conn(), "B1").unwrap());
    }

    #[test]
    fn test_tags_and_payloads_roundtrip() {
        use codescan_types::{ImpactSeverity, SoftwareQuality};

        let (store, _temp) = open_store();
        store.insert_branch(&BranchRow::new("B1", "P1", "main")).unwrap();
        store
            .insert_issue(
                &IssueRow::new("I1", "B1", "P1")
                    .with_tags(vec!["convention".to_string(), "pitfall".to_string()])
                    .with_impacts(vec![Impact::new(
                        SoftwareQuality::Maintainability,
                        ImpactSeverity::High,
                    )]),
            )
            .unwrap();

        let session = store.read_session().unwrap();
        let page = select_issue_page(session.conn(), &ScanScope::All, 0, 10).unwrap();
        assert_eq!(page[0].tags.as_deref(), Some("convention,pitfall"));
        let impacts = Impact::decode_list(page[0].impacts.as_ref().unwrap()).unwrap();
        assert_eq!(impacts.len(), 1);
    }
}
