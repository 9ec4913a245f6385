//! Store open/close and session handling.
//!
//! One write connection guarded by a mutex, plus independent read-only
//! connections for scans. Readers and the writer coexist through WAL; a
//! busy timeout covers short contention windows between concurrent
//! producers and sweep consumers.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// SQLite-backed store for issue rows and the recovery queue.
pub struct Store {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Store {
    /// Open the store at the given path, creating tables if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!(path = ?path, "Opening store");

        let conn = Connection::open(path)?;
        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::bootstrap(&conn)?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure against the write connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        f(&conn)
    }

    /// Open a dedicated read-only session for a scan.
    ///
    /// Each reader holds exactly one session; dropping the session releases
    /// the underlying connection on every exit path, including early
    /// abandonment of a scan.
    pub fn read_session(&self) -> Result<ReadSession, StoreError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!(path = ?self.path, "Opened read session");
        Ok(ReadSession { conn })
    }
}

/// An exclusive read-only session over the store.
pub struct ReadSession {
    conn: Connection,
}

impl ReadSession {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for ReadSession {
    fn drop(&mut self) {
        debug!("Released read session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_tables() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("db.sqlite")).unwrap();

        let count: i64 = store
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert!(count >= 3);
    }

    #[test]
    fn test_read_session_sees_committed_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("db.sqlite")).unwrap();

        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO branches (uuid, project_uuid, kee, is_main) VALUES ('B1', 'P1', 'main', 1)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let session = store.read_session().unwrap();
        let uuid: String = session
            .conn()
            .query_row("SELECT uuid FROM branches", [], |row| row.get(0))
            .unwrap();
        assert_eq!(uuid, "B1");
    }

    #[test]
    fn test_read_session_rejects_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("db.sqlite")).unwrap();

        let session = store.read_session().unwrap();
        let result = session.conn().execute(
            "INSERT INTO branches (uuid, project_uuid, kee, is_main) VALUES ('B1', 'P1', 'main', 1)",
            [],
        );
        assert!(result.is_err());
    }
}
