//! Key-value store module
//!
//! Durable, field-compressed, named-collection storage. This backs the
//! metadata caches and the resumable work queues of the pipeline:
//! - A storage-agnostic [`KeyValueStore`] trait with cursor-based bulk scans
//! - Short/long field-name compression fixed per collection
//! - A typed [`Collection`] wrapper with concurrent bulk iteration
//! - SQLite and in-memory backends

mod collection;
mod fields;
mod memory;
mod sqlite;
mod traits;

pub use collection::Collection;
pub use fields::FieldTable;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, ScanPage};

use crate::StoreResult;
use std::path::Path;
use std::sync::Arc;

/// Number of entries fetched per scan batch during bulk iteration.
pub const SCAN_BATCH_SIZE: usize = 100;

/// Opens the SQLite-backed store at the given path.
pub fn open_store(path: &Path) -> StoreResult<Arc<dyn KeyValueStore>> {
    Ok(Arc::new(SqliteStore::new(path)?))
}
