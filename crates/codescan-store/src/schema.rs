//! Schema bootstrap for the tables this core owns.
//!
//! `recovery_queue` is the durable recovery log: one row per pending item,
//! keyed by `(doc_id, doc_id_type)` so duplicate identities coalesce.
//! `issues` and `branches` hold the relational truth the reader scans.

use rusqlite::Connection;

use crate::error::StoreError;

const BOOTSTRAP_SQL: &str = "
CREATE TABLE IF NOT EXISTS branches (
    uuid TEXT PRIMARY KEY,
    project_uuid TEXT NOT NULL,
    kee TEXT NOT NULL,
    is_main INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_branches_project ON branches(project_uuid);

CREATE TABLE IF NOT EXISTS issues (
    kee TEXT PRIMARY KEY,
    component_uuid TEXT NOT NULL,
    branch_uuid TEXT NOT NULL,
    project_uuid TEXT NOT NULL,
    rule_key TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    resolution TEXT,
    language TEXT,
    line INTEGER,
    effort INTEGER,
    tags TEXT,
    security_standards TEXT,
    impacts BLOB,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    closed_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_issues_branch ON issues(branch_uuid);
CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_uuid);

CREATE TABLE IF NOT EXISTS recovery_queue (
    doc_id TEXT NOT NULL,
    doc_id_type TEXT NOT NULL,
    doc_routing TEXT NOT NULL,
    inserted_at INTEGER NOT NULL,
    PRIMARY KEY (doc_id, doc_id_type)
);
CREATE INDEX IF NOT EXISTS idx_recovery_queue_inserted ON recovery_queue(inserted_at);
";

/// Create all tables and indexes if they do not exist yet.
pub fn bootstrap(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(BOOTSTRAP_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        bootstrap(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('issues', 'branches', 'recovery_queue')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
