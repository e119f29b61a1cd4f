//! Pipeline data model
//!
//! The unit records the pipeline stores and queues: article metadata, queued
//! media downloads, and redirect aliases, together with the field-compression
//! tables their collections are created with.

use crate::store::FieldTable;
use serde::{Deserialize, Serialize};

/// One content unit as enumerated from the remote content list.
///
/// The identifier (the storage key) is unique within a run. Pagination
/// siblings share a base identifier with a numeric suffix (`{id}__{n}`).
/// A detail is mutated when sub-page pagination splits a unit and is
/// immutable once a renderer has consumed it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub title: String,

    #[serde(default)]
    pub namespace: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_categories: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    /// Member pages of a category-like unit; drives pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,

    /// Raw geo-coordinates string ("lat;lon") when the article carries them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub revision_id: u64,

    /// Bundle path of the locally cached thumbnail, once fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_thumbnail_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_id: Option<String>,

    #[serde(default)]
    pub missing: bool,
}

impl ArticleDetail {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Thumbnail descriptor carried on an article detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

/// A queued media download.
///
/// Lives in the files-to-download queue; moves to the files-to-retry queue
/// exactly once per failed attempt and is removed on success or final
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetail {
    pub url: String,

    /// Client-requested pixel density multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

fn default_multiplier() -> f64 {
    1.0
}

/// Maps an alias identifier to its canonical target.
///
/// Chains are flattened at write time; readers never follow more than one
/// hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRedirect {
    pub target_id: String,
    pub title: String,
}

/// Record of one harvest run, kept in the store across runs.
///
/// Written when a session starts and completed with counters when the run
/// finishes; an entry with no `finished_at` marks an interrupted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,

    #[serde(default)]
    pub articles_ok: u64,

    #[serde(default)]
    pub articles_failed: u64,

    #[serde(default)]
    pub media_ok: u64,

    #[serde(default)]
    pub media_failed: u64,

    #[serde(default)]
    pub redirects: u64,
}

/// Field table for the article detail collection.
pub fn article_field_table() -> FieldTable {
    FieldTable::new(&[
        ("title", "t"),
        ("namespace", "n"),
        ("sub_categories", "sc"),
        ("categories", "c"),
        ("pages", "p"),
        ("thumbnail", "th"),
        ("coordinates", "co"),
        ("timestamp", "ts"),
        ("revision_id", "r"),
        ("internal_thumbnail_path", "it"),
        ("next_id", "ni"),
        ("prev_id", "pi"),
        ("missing", "m"),
    ])
}

/// Field table for both media queues.
pub fn file_field_table() -> FieldTable {
    FieldTable::new(&[("url", "u"), ("multiplier", "m"), ("width", "w")])
}

/// Field table for the redirect collection.
pub fn redirect_field_table() -> FieldTable {
    FieldTable::new(&[("target_id", "t"), ("title", "tt")])
}

/// Names of the store collections the pipeline uses.
pub mod collections {
    pub const ARTICLES: &str = "article_detail";
    pub const FILES_TO_DOWNLOAD: &str = "files_to_download";
    pub const FILES_TO_RETRY: &str = "files_to_retry";
    pub const REDIRECTS: &str = "redirects";
    pub const RUNS: &str = "runs";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_detail_serializes_compactly() {
        let detail = ArticleDetail {
            title: "Earth".to_string(),
            revision_id: 42,
            ..Default::default()
        };
        let json = serde_json::to_value(&detail).unwrap();

        // Optional fields are omitted entirely, not serialized as null.
        assert!(json.get("thumbnail").is_none());
        assert!(json.get("next_id").is_none());
    }

    #[test]
    fn test_file_detail_default_multiplier() {
        let detail: FileDetail = serde_json::from_str(r#"{"url":"https://x/img.png"}"#).unwrap();
        assert_eq!(detail.multiplier, 1.0);
        assert_eq!(detail.width, None);
    }

    #[test]
    fn test_field_tables_round_trip_through_compression() {
        let table = article_field_table();
        let detail = ArticleDetail {
            title: "Earth".to_string(),
            namespace: 0,
            coordinates: Some("51.5;-0.1".to_string()),
            revision_id: 7,
            ..Default::default()
        };
        let json = serde_json::to_value(&detail).unwrap();
        let restored: ArticleDetail =
            serde_json::from_value(table.expand(table.compress(json))).unwrap();
        assert_eq!(restored, detail);
    }
}
