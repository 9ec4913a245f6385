//! Durable recovery queue.
//!
//! Append-friendly log of pending synchronization work. Inserts upsert on
//! the `(doc_id, doc_id_type)` identity so duplicate changes coalesce;
//! deletes are idempotent so concurrent sweeps can race each other safely.

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use codescan_types::{DocIdType, RecoveryItem};

use crate::db::Store;
use crate::error::StoreError;

impl Store {
    /// Persist recovery items, coalescing duplicate identities
    /// (last write wins).
    pub fn insert_recovery_items(&self, items: &[RecoveryItem]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO recovery_queue (doc_id, doc_id_type, doc_routing, inserted_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(doc_id, doc_id_type) \
                 DO UPDATE SET doc_routing = excluded.doc_routing, inserted_at = excluded.inserted_at",
            )?;
            for item in items {
                stmt.execute(rusqlite::params![
                    item.doc_id,
                    item.doc_id_type.as_str(),
                    item.routing,
                    item.inserted_at.timestamp_millis(),
                ])?;
            }
            debug!(count = items.len(), "Persisted recovery items");
            Ok(())
        })
    }

    /// Fetch pending items inserted at or before `max_inserted_at`, oldest
    /// first.
    ///
    /// Rows whose `doc_id_type` tag is not recognized (written by another
    /// version) are reported and left in place for manual repair.
    pub fn fetch_pending(
        &self,
        max_inserted_at: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RecoveryItem>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT doc_id, doc_id_type, doc_routing, inserted_at FROM recovery_queue \
                 WHERE inserted_at <= ?1 ORDER BY inserted_at ASC, doc_id ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![max_inserted_at.timestamp_millis(), limit as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )?;

            let mut items = Vec::new();
            for row in rows {
                let (doc_id, type_tag, routing, inserted_at) = row?;
                match DocIdType::parse(&type_tag) {
                    Some(doc_id_type) => items.push(RecoveryItem {
                        doc_id,
                        doc_id_type,
                        routing,
                        inserted_at: DateTime::from_timestamp_millis(inserted_at)
                            .unwrap_or_default(),
                    }),
                    None => {
                        error!(
                            doc_id = %doc_id,
                            doc_id_type = %type_tag,
                            "Unsupported recovery_queue.doc_id_type, manual fix is required"
                        );
                    }
                }
            }
            Ok(items)
        })
    }

    /// Delete resolved items by identity. Absent rows are a no-op, not an
    /// error: another sweep may already have resolved them.
    pub fn delete_recovery_items(&self, items: &[RecoveryItem]) -> Result<usize, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("DELETE FROM recovery_queue WHERE doc_id = ?1 AND doc_id_type = ?2")?;
            let mut deleted = 0;
            for item in items {
                deleted += stmt.execute(rusqlite::params![
                    item.doc_id,
                    item.doc_id_type.as_str()
                ])?;
            }
            debug!(requested = items.len(), deleted, "Deleted recovery items");
            Ok(deleted)
        })
    }

    /// Number of pending items.
    pub fn recovery_queue_size(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM recovery_queue", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Insert a raw queue row, bypassing the typed API. Exists for
    /// operational repair tooling and for exercising the unknown-tag path.
    pub fn insert_raw_recovery_row(
        &self,
        doc_id: &str,
        doc_id_type: &str,
        routing: &str,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO recovery_queue (doc_id, doc_id_type, doc_routing, inserted_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![doc_id, doc_id_type, routing, Utc::now().timestamp_millis()],
            )?;
            Ok(())
        })
    }
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
    fn test_insert_and_fetch() {
        let (store, _temp) = open_store();
        store
            .insert_recovery_items(&[
                RecoveryItem::for_issue("I1", "P1"),
                RecoveryItem::for_branch("B1", "P1"),
            ])
            .unwrap();

        let items = store.fetch_pending(Utc::now(), 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(store.recovery_queue_size().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_identities_coalesce() {
        let (store, _temp) = open_store();
        for _ in 0..3 {
            store
                .insert_recovery_items(&[RecoveryItem::for_issue("I1", "P1")])
                .unwrap();
        }

        assert_eq!(store.recovery_queue_size().unwrap(), 1);

        // same doc id under a different type is a distinct identity
        store
            .insert_recovery_items(&[RecoveryItem::for_branch("I1", "P1")])
            .unwrap();
        assert_eq!(store.recovery_queue_size().unwrap(), 2);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _temp) = open_store();
        let item = RecoveryItem::for_issue("I1", "P1");
        store.insert_recovery_items(&[item.clone()]).unwrap();

        assert_eq!(store.delete_recovery_items(&[item.clone()]).unwrap(), 1);
        // already gone: no-op, not an error
        assert_eq!(store.delete_recovery_items(&[item]).unwrap(), 0);
    }

    #[test]
    fn test_fetch_respects_max_inserted_at() {
        let (store, _temp) = open_store();
        store
            .insert_recovery_items(&[RecoveryItem::for_issue("I1", "P1")])
            .unwrap();

        let too_early = Utc::now() - chrono::Duration::seconds(60);
        assert!(store.fetch_pending(too_early, 10).unwrap().is_empty());
        assert_eq!(store.fetch_pending(Utc::now(), 10).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_type_tag_is_skipped_and_kept() {
        let (store, _temp) = open_store();
        store
            .insert_raw_recovery_row("I1", "unknown", "P1")
            .unwrap();
        store
            .insert_recovery_items(&[RecoveryItem::for_issue("I2", "P1")])
            .unwrap();

        let items = store.fetch_pending(Utc::now(), 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].doc_id, "I2");
        // the unknown row stays for manual repair
        assert_eq!(store.recovery_queue_size().unwrap(), 2);
    }
}
