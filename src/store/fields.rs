//! Short/long field-name compression
//!
//! High-cardinality collections (per-article metadata, per-file
//! descriptors) store millions of identical field names. A collection
//! constructed with a field table rewrites long names to short ones before
//! storage and back on every read, halving or better the stored footprint.
//! The table is fixed per collection at creation time.

use serde_json::Value;
use std::collections::HashMap;

/// Bidirectional long↔short field-name mapping for one collection
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    to_short: HashMap<&'static str, &'static str>,
    to_long: HashMap<&'static str, &'static str>,
}

impl FieldTable {
    /// Builds a table from (long, short) pairs.
    pub fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        let mut to_short = HashMap::with_capacity(pairs.len());
        let mut to_long = HashMap::with_capacity(pairs.len());
        for (long, short) in pairs {
            to_short.insert(*long, *short);
            to_long.insert(*short, *long);
        }
        Self { to_short, to_long }
    }

    /// Rewrites top-level long field names to short ones.
    ///
    /// Unmapped fields pass through unchanged. Non-object values are
    /// returned as-is.
    pub fn compress(&self, value: Value) -> Value {
        self.rename(value, &self.to_short)
    }

    /// Rewrites top-level short field names back to long ones.
    pub fn expand(&self, value: Value) -> Value {
        self.rename(value, &self.to_long)
    }

    fn rename(&self, value: Value, table: &HashMap<&'static str, &'static str>) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, inner)| {
                        let renamed = table
                            .get(key.as_str())
                            .map(|short| (*short).to_string())
                            .unwrap_or(key);
                        (renamed, inner)
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}
