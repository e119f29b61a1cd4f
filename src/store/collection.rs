//! Typed collection handle
//!
//! A [`Collection`] binds a record type, a collection name, and an optional
//! field-compression table to a store handle. All reads and writes through
//! the collection use the same table, fixed at construction time. Bulk
//! iteration drives the backend's cursor scan with a configurable number of
//! concurrent fetch+handle workers.

use crate::store::fields::FieldTable;
use crate::store::traits::KeyValueStore;
use crate::store::SCAN_BATCH_SIZE;
use crate::{MirrorError, Result, StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Typed, named-collection view over a [`KeyValueStore`]
pub struct Collection<T> {
    store: Arc<dyn KeyValueStore>,
    name: String,
    fields: Option<FieldTable>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name.clone(),
            fields: self.fields.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Opens the named collection, creating it if needed.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        name: &str,
        fields: Option<FieldTable>,
    ) -> StoreResult<Self> {
        store.ensure_collection(name)?;
        Ok(Self {
            store,
            name: name.to_string(),
            fields,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, value: &T) -> StoreResult<String> {
        let mut json = serde_json::to_value(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(fields) = &self.fields {
            json = fields.compress(json);
        }
        serde_json::to_string(&json).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(&self, raw: &str) -> StoreResult<T> {
        let mut json: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(fields) = &self.fields {
            json = fields.expand(json);
        }
        serde_json::from_value(json).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<T>> {
        match self.store.get(&self.name, key)? {
            Some(raw) => Ok(Some(self.decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Fetches many entries; absent keys are silently omitted.
    pub fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, T>> {
        let raw = self.store.get_many(&self.name, keys)?;
        let mut decoded = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            decoded.insert(key, self.decode(&value)?);
        }
        Ok(decoded)
    }

    pub fn set(&self, key: &str, value: &T) -> StoreResult<()> {
        let encoded = self.encode(value)?;
        self.store.set(&self.name, key, &encoded)
    }

    pub fn set_many(&self, entries: &[(String, T)]) -> StoreResult<()> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            encoded.push((key.clone(), self.encode(value)?));
        }
        self.store.set_many(&self.name, &encoded)
    }

    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.store.delete(&self.name, key)
    }

    pub fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        self.store.delete_many(&self.name, keys)
    }

    pub fn len(&self) -> StoreResult<u64> {
        self.store.len(&self.name)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Empties the collection. Used at run teardown.
    pub fn flush(&self) -> StoreResult<()> {
        self.store.flush(&self.name)
    }

    pub fn keys(&self) -> StoreResult<Vec<String>> {
        self.store.keys(&self.name)
    }

    /// Drives a concurrent cursor-based bulk scan over the collection.
    ///
    /// `worker_count` fetch+handle cycles run concurrently; each handler
    /// call receives one decoded batch plus the number of currently active
    /// workers. Every entry existing at scan start is visited exactly once
    /// (absent store mutation during the scan). The first handler or store
    /// error stops all workers and is returned.
    pub async fn iterate_items<F, Fut>(&self, worker_count: usize, handler: F) -> Result<()>
    where
        F: Fn(Vec<(String, T)>, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        if worker_count == 0 {
            return Err(MirrorError::InvalidArgument(
                "iterate_items worker count must be a positive integer".to_string(),
            ));
        }

        struct ScanState {
            cursor: u64,
            done: bool,
        }

        let state = Arc::new(Mutex::new(ScanState {
            cursor: 0,
            done: false,
        }));
        let active = Arc::new(AtomicUsize::new(0));
        let failure: Arc<Mutex<Option<MirrorError>>> = Arc::new(Mutex::new(None));
        let handler = Arc::new(handler);

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let collection = self.clone();
            let state = Arc::clone(&state);
            let active = Arc::clone(&active);
            let failure = Arc::clone(&failure);
            let handler = Arc::clone(&handler);

            workers.push(tokio::spawn(async move {
                active.fetch_add(1, Ordering::SeqCst);
                loop {
                    // Claim the next cursor window under the lock so every
                    // batch is handed to exactly one worker.
                    let page = {
                        let mut state = state.lock().unwrap();
                        if state.done {
                            break;
                        }
                        match collection.store.scan(
                            &collection.name,
                            state.cursor,
                            SCAN_BATCH_SIZE,
                        ) {
                            Ok(page) => {
                                if page.next_cursor == 0 {
                                    state.done = true;
                                } else {
                                    state.cursor = page.next_cursor;
                                }
                                page
                            }
                            Err(error) => {
                                state.done = true;
                                let mut failure = failure.lock().unwrap();
                                if failure.is_none() {
                                    *failure = Some(error.into());
                                }
                                break;
                            }
                        }
                    };

                    if page.entries.is_empty() {
                        break;
                    }

                    let mut batch = Vec::with_capacity(page.entries.len());
                    let mut decode_error = None;
                    for (key, raw) in page.entries {
                        match collection.decode(&raw) {
                            Ok(value) => batch.push((key, value)),
                            Err(error) => {
                                decode_error = Some(error);
                                break;
                            }
                        }
                    }
                    if let Some(error) = decode_error {
                        state.lock().unwrap().done = true;
                        let mut failure = failure.lock().unwrap();
                        if failure.is_none() {
                            *failure = Some(error.into());
                        }
                        break;
                    }

                    let currently_active = active.load(Ordering::SeqCst);
                    if let Err(error) = handler(batch, currently_active).await {
                        state.lock().unwrap().done = true;
                        let mut failure = failure.lock().unwrap();
                        if failure.is_none() {
                            *failure = Some(error);
                        }
                        break;
                    }
                }
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for worker in workers {
            worker
                .await
                .map_err(|e| MirrorError::Store(StoreError::Backend(e.to_string())))?;
        }

        let outcome = failure.lock().unwrap().take();
        match outcome {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use std::collections::HashSet;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        title: String,
        revision_id: u64,
    }

    fn record_fields() -> FieldTable {
        FieldTable::new(&[("title", "t"), ("revision_id", "r")])
    }

    fn open_collection(fields: Option<FieldTable>) -> (Arc<dyn KeyValueStore>, Collection<Record>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let collection = Collection::new(Arc::clone(&store), "records", fields).unwrap();
        (store, collection)
    }

    #[test]
    fn test_field_compression_round_trip() {
        let (store, collection) = open_collection(Some(record_fields()));
        let record = Record {
            title: "Earth".to_string(),
            revision_id: 42,
        };
        collection.set("Earth", &record).unwrap();

        // Stored representation carries the short names.
        let raw = store.get("records", "Earth").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json.get("t").is_some());
        assert!(json.get("title").is_none());

        // Reads restore the long names.
        assert_eq!(collection.get("Earth").unwrap(), Some(record));
    }

    #[test]
    fn test_set_many_then_get_many() {
        let (_, collection) = open_collection(None);
        let entries: Vec<(String, Record)> = (0..5)
            .map(|i| {
                (
                    format!("key{i}"),
                    Record {
                        title: format!("Title {i}"),
                        revision_id: i,
                    },
                )
            })
            .collect();
        collection.set_many(&entries).unwrap();

        let found = collection
            .get_many(&["key1".to_string(), "key3".to_string(), "nope".to_string()])
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["key3"].revision_id, 3);
    }

    #[tokio::test]
    async fn test_iterate_visits_every_entry_exactly_once() {
        let (_, collection) = open_collection(Some(record_fields()));
        let entries: Vec<(String, Record)> = (0..1000)
            .map(|i| {
                (
                    format!("key{i:04}"),
                    Record {
                        title: format!("Title {i}"),
                        revision_id: i,
                    },
                )
            })
            .collect();
        collection.set_many(&entries).unwrap();

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let max_active = Arc::new(AtomicUsize::new(0));

        let seen_clone = Arc::clone(&seen);
        let max_clone = Arc::clone(&max_active);
        collection
            .iterate_items(2, move |batch, active| {
                let seen = Arc::clone(&seen_clone);
                let max_active = Arc::clone(&max_clone);
                async move {
                    max_active.fetch_max(active, Ordering::SeqCst);
                    let delay = (batch.len() % 3) as u64 * 10;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    seen.lock()
                        .unwrap()
                        .extend(batch.into_iter().map(|(key, _)| key));
                    Ok(())
                }
            })
            .await
            .unwrap();

        let visited = seen.lock().unwrap();
        let distinct: HashSet<&String> = visited.iter().collect();
        assert_eq!(visited.len(), 1000);
        assert_eq!(distinct.len(), 1000);
        assert_eq!(max_active.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_iterate_zero_workers_rejected() {
        let (_, collection) = open_collection(None);
        let outcome = collection
            .iterate_items(0, |_batch, _active| async move { Ok(()) })
            .await;
        assert!(matches!(outcome, Err(MirrorError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_iterate_propagates_handler_error() {
        let (_, collection) = open_collection(None);
        collection
            .set(
                "only",
                &Record {
                    title: "x".to_string(),
                    revision_id: 1,
                },
            )
            .unwrap();

        let outcome = collection
            .iterate_items(2, |_batch, _active| async move {
                Err(MirrorError::InvalidArgument("handler failed".to_string()))
            })
            .await;
        assert!(matches!(outcome, Err(MirrorError::InvalidArgument(_))));
    }
}
