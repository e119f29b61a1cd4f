//! Wikimirror: an offline mirror builder for MediaWiki-style sites
//!
//! This crate harvests content from a remote content-management API and
//! rewrites it into a self-contained, link-consistent offline bundle. It
//! detects which content-retrieval API surfaces the target exposes, picks a
//! matching renderer, fetches articles and media under bounded concurrency
//! with retry discipline, rewrites every in-document link to a relative
//! offline path, and substitutes a placeholder document for every unit that
//! could not be fetched.

pub mod bundle;
pub mod classify;
pub mod config;
pub mod download;
pub mod exec;
pub mod model;
pub mod pipeline;
pub mod probe;
pub mod renderer;
pub mod store;
pub mod urlrw;

use thiserror::Error;

use crate::download::DownloadError;

/// Main error type for wikimirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Programming error: a caller misused an API (bad concurrency limit,
    /// out-of-range cursor). Never retried; aborts the enclosing operation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Run-level failure: no compatible renderer, capability probe entirely
    /// failed, store unreachable. Terminates the whole run.
    #[error("Fatal startup error: {0}")]
    FatalStartup(String),

    /// Terminal per-request failure after retries are exhausted. Carries
    /// exactly the fields the error classifier needs.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The article existed when the content list was enumerated but was
    /// removed before it could be fetched.
    #[error("Article deleted between listing and fetch: {article_id}")]
    DeletedArticle { article_id: String },

    /// Malformed input reached a renderer. Fatal for the unit, not the run.
    #[error("Render error for {article_id}: {message}")]
    Render { article_id: String, message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Bundle write error for {path}: {source}")]
    Bundle {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the key-value store
///
/// The store performs no internal retry; retry discipline belongs to the
/// downloader layer or the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A scan cursor pointing past the end of the collection. Fatal: a stale
    /// cursor means the caller retained it across unrelated scans.
    #[error("Stale or out-of-range scan cursor: {cursor}")]
    StaleCursor { cursor: u64 },
}

/// Result type alias for wikimirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{ArticleDetail, ArticleRedirect, FileDetail};
pub use pipeline::Session;
pub use probe::CapabilitySet;
