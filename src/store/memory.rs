//! In-memory store backend
//!
//! Implements the same cursor contract as the SQLite backend against plain
//! maps. Used by tests and available wherever durability is not needed.

use crate::store::traits::{KeyValueStore, ScanPage};
use crate::{StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct MemoryCollection {
    /// Insertion-ordered entries; the id doubles as the scan cursor.
    by_id: BTreeMap<u64, (String, String)>,
    id_by_key: HashMap<String, u64>,
    next_id: u64,
}

impl MemoryCollection {
    fn insert(&mut self, key: &str, value: &str) {
        if let Some(id) = self.id_by_key.get(key) {
            // Overwrite in place so the entry keeps its scan position.
            self.by_id
                .insert(*id, (key.to_string(), value.to_string()));
            return;
        }
        self.next_id += 1;
        self.by_id
            .insert(self.next_id, (key.to_string(), value.to_string()));
        self.id_by_key.insert(key.to_string(), self.next_id);
    }

    fn remove(&mut self, key: &str) {
        if let Some(id) = self.id_by_key.remove(key) {
            self.by_id.remove(&id);
        }
    }
}

/// Map-backed key-value store
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MemoryCollection) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.entry(name.to_string()).or_default();
        f(collection)
    }
}

impl KeyValueStore for MemoryStore {
    fn ensure_collection(&self, collection: &str) -> StoreResult<()> {
        self.with_collection(collection, |_| Ok(()))
    }

    fn get(&self, collection: &str, key: &str) -> StoreResult<Option<String>> {
        self.with_collection(collection, |c| {
            Ok(c.id_by_key
                .get(key)
                .and_then(|id| c.by_id.get(id))
                .map(|(_, value)| value.clone()))
        })
    }

    fn get_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, String>> {
        self.with_collection(collection, |c| {
            let mut found = HashMap::new();
            for key in keys {
                if let Some((_, value)) = c.id_by_key.get(key).and_then(|id| c.by_id.get(id)) {
                    found.insert(key.clone(), value.clone());
                }
            }
            Ok(found)
        })
    }

    fn set(&self, collection: &str, key: &str, value: &str) -> StoreResult<()> {
        self.with_collection(collection, |c| {
            c.insert(key, value);
            Ok(())
        })
    }

    fn set_many(&self, collection: &str, entries: &[(String, String)]) -> StoreResult<()> {
        self.with_collection(collection, |c| {
            for (key, value) in entries {
                c.insert(key, value);
            }
            Ok(())
        })
    }

    fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        self.with_collection(collection, |c| {
            c.remove(key);
            Ok(())
        })
    }

    fn delete_many(&self, collection: &str, keys: &[String]) -> StoreResult<()> {
        self.with_collection(collection, |c| {
            for key in keys {
                c.remove(key);
            }
            Ok(())
        })
    }

    fn len(&self, collection: &str) -> StoreResult<u64> {
        self.with_collection(collection, |c| Ok(c.by_id.len() as u64))
    }

    fn flush(&self, collection: &str) -> StoreResult<()> {
        self.with_collection(collection, |c| {
            c.by_id.clear();
            c.id_by_key.clear();
            Ok(())
        })
    }

    fn keys(&self, collection: &str) -> StoreResult<Vec<String>> {
        self.with_collection(collection, |c| {
            Ok(c.by_id.values().map(|(key, _)| key.clone()).collect())
        })
    }

    fn scan(&self, collection: &str, cursor: u64, batch: usize) -> StoreResult<ScanPage> {
        self.with_collection(collection, |c| {
            if cursor != 0 {
                let max_id = c.by_id.keys().next_back().copied().unwrap_or(0);
                if cursor > max_id {
                    return Err(StoreError::StaleCursor { cursor });
                }
            }

            let mut entries = Vec::with_capacity(batch);
            let mut last_id = 0;
            for (id, (key, value)) in c.by_id.range(cursor + 1..).take(batch) {
                last_id = *id;
                entries.push((key.clone(), value.clone()));
            }

            let next_cursor = if entries.len() < batch { 0 } else { last_id };
            Ok(ScanPage {
                entries,
                next_cursor,
            })
        })
    }
}
