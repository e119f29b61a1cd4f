//! SQLite store backend
//!
//! One table per collection, keyed by a text primary key with SQLite's
//! rowid serving as the scan cursor watermark.

use crate::store::traits::{KeyValueStore, ScanPage};
use crate::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed key-value store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the store at the given path.
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (for testing).
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn table_name(collection: &str) -> StoreResult<String> {
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StoreError::Backend(format!(
                "invalid collection name: {collection:?}"
            )));
        }
        Ok(format!("kv_{collection}"))
    }
}

impl KeyValueStore for SqliteStore {
    fn ensure_collection(&self, collection: &str) -> StoreResult<()> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ))?;
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> StoreResult<Option<String>> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                &format!("SELECT value FROM {table} WHERE key = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn get_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, String>> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT value FROM {table} WHERE key = ?1"))?;

        let mut found = HashMap::new();
        for key in keys {
            let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
            if let Some(value) = value {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn set(&self, collection: &str, key: &str, value: &str) -> StoreResult<()> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {table} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            ),
            params![key, value],
        )?;
        Ok(())
    }

    fn set_many(&self, collection: &str, entries: &[(String, String)]) -> StoreResult<()> {
        let table = Self::table_name(collection)?;
        let mut conn = self.conn.lock().unwrap();

        // A single transaction: no partial application within one call.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            ))?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {table} WHERE key = ?1"), params![key])?;
        Ok(())
    }

    fn delete_many(&self, collection: &str, keys: &[String]) -> StoreResult<()> {
        let table = Self::table_name(collection)?;
        let mut conn = self.conn.lock().unwrap();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM {table} WHERE key = ?1"))?;
            for key in keys {
                stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn len(&self, collection: &str) -> StoreResult<u64> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    fn flush(&self, collection: &str) -> StoreResult<()> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {table}"), [])?;
        Ok(())
    }

    fn keys(&self, collection: &str) -> StoreResult<Vec<String>> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT key FROM {table} ORDER BY rowid"))?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn scan(&self, collection: &str, cursor: u64, batch: usize) -> StoreResult<ScanPage> {
        let table = Self::table_name(collection)?;
        let conn = self.conn.lock().unwrap();

        if cursor != 0 {
            let max_rowid: Option<i64> =
                conn.query_row(&format!("SELECT MAX(rowid) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            let max_rowid = max_rowid.unwrap_or(0).max(0) as u64;
            if cursor > max_rowid {
                return Err(StoreError::StaleCursor { cursor });
            }
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT rowid, key, value FROM {table} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"
        ))?;
        let mut rows = stmt.query(params![cursor as i64, batch as i64])?;

        let mut entries = Vec::with_capacity(batch);
        let mut last_rowid: u64 = 0;
        while let Some(row) = rows.next()? {
            let rowid: i64 = row.get(0)?;
            last_rowid = rowid as u64;
            entries.push((row.get(1)?, row.get(2)?));
        }

        let next_cursor = if entries.len() < batch { 0 } else { last_rowid };
        Ok(ScanPage {
            entries,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize) -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        store.ensure_collection("pages").unwrap();
        for i in 0..n {
            store
                .set("pages", &format!("key{i}"), &format!("value{i}"))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_get_set_round_trip() {
        let store = seeded(1);
        assert_eq!(
            store.get("pages", "key0").unwrap(),
            Some("value0".to_string())
        );
        assert_eq!(store.get("pages", "absent").unwrap(), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let store = seeded(1);
        store.set("pages", "key0", "rewritten").unwrap();
        assert_eq!(
            store.get("pages", "key0").unwrap(),
            Some("rewritten".to_string())
        );
        assert_eq!(store.len("pages").unwrap(), 1);
    }

    #[test]
    fn test_get_many_omits_absent_keys() {
        let store = seeded(3);
        let found = store
            .get_many(
                "pages",
                &[
                    "key0".to_string(),
                    "missing".to_string(),
                    "key2".to_string(),
                ],
            )
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(!found.contains_key("missing"));
    }

    #[test]
    fn test_flush_empties_collection() {
        let store = seeded(5);
        store.flush("pages").unwrap();
        assert_eq!(store.len("pages").unwrap(), 0);
    }

    #[test]
    fn test_scan_visits_every_entry_once() {
        let store = seeded(25);
        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            let page = store.scan("pages", cursor, 10).unwrap();
            seen.extend(page.entries.into_iter().map(|(k, _)| k));
            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_stale_cursor_is_fatal() {
        let store = seeded(3);
        let outcome = store.scan("pages", 9999, 10);
        assert!(matches!(
            outcome,
            Err(StoreError::StaleCursor { cursor: 9999 })
        ));
    }

    #[test]
    fn test_invalid_collection_name_rejected() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(store.ensure_collection("bad name; drop").is_err());
    }
}
