//! Storage trait and scan types
//!
//! The trait is deliberately storage-agnostic: values are opaque strings
//! under string keys inside named collections. Typed access and field
//! compression live in [`crate::store::Collection`].

use crate::StoreResult;
use std::collections::HashMap;

/// One page of a cursor-based bulk scan.
///
/// A `next_cursor` of zero signals scan completion. The cursor is opaque to
/// callers: it is returned by every scan call and passed into the next, and
/// must never be retained across unrelated scans.
#[derive(Debug, Clone)]
pub struct ScanPage {
    /// Entries in this page, as (key, raw value) pairs.
    pub entries: Vec<(String, String)>,

    /// Cursor for the next scan call; zero when the scan is complete.
    pub next_cursor: u64,
}

/// Trait for key-value store backends
///
/// Implementations must be thread-safe: the store is the only process-wide
/// mutable structure shared across all concurrent pipeline activity.
/// Individual operations are atomic (single key or explicit multi-key
/// batch); the store has no cross-call transactions and no internal retry.
pub trait KeyValueStore: Send + Sync {
    /// Creates the named collection if it does not exist yet.
    fn ensure_collection(&self, collection: &str) -> StoreResult<()>;

    /// Gets a raw value, or `None` when the key is absent.
    fn get(&self, collection: &str, key: &str) -> StoreResult<Option<String>>;

    /// Gets many raw values; absent keys are silently omitted.
    fn get_many(&self, collection: &str, keys: &[String])
        -> StoreResult<HashMap<String, String>>;

    /// Sets a single value. Last writer wins.
    fn set(&self, collection: &str, key: &str, value: &str) -> StoreResult<()>;

    /// Sets many values in one batch with no partial application.
    fn set_many(&self, collection: &str, entries: &[(String, String)]) -> StoreResult<()>;

    /// Deletes a single key. Deleting an absent key is not an error.
    fn delete(&self, collection: &str, key: &str) -> StoreResult<()>;

    /// Deletes many keys in one batch.
    fn delete_many(&self, collection: &str, keys: &[String]) -> StoreResult<()>;

    /// Returns the current entry count.
    fn len(&self, collection: &str) -> StoreResult<u64>;

    /// Empties the collection. Used at run teardown.
    fn flush(&self, collection: &str) -> StoreResult<()>;

    /// Returns the full key set. May be O(n); use sparingly.
    fn keys(&self, collection: &str) -> StoreResult<Vec<String>>;

    /// Fetches one bounded batch of entries starting after `cursor`.
    ///
    /// Start a scan with a cursor of zero. A returned `next_cursor` of zero
    /// means the scan is complete. A nonzero cursor past the collection's
    /// range is a [`crate::StoreError::StaleCursor`], fatal and never
    /// retried.
    fn scan(&self, collection: &str, cursor: u64, batch: usize) -> StoreResult<ScanPage>;
}
