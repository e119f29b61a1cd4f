//! Bundle output module
//!
//! The pipeline hands every finished unit to a [`BundleSink`]: a path
//! inside the bundle, a MIME type, and the bytes. The sink owns layout and
//! durability; the filesystem sink here writes a plain directory tree that
//! an archive packer can consume afterwards.

use crate::{MirrorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for finished bundle entries.
pub trait BundleSink: Send + Sync {
    fn add(&self, path: &str, mime: &str, data: &[u8]) -> Result<()>;
}

/// Writes bundle entries into a directory tree.
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|source| MirrorError::Bundle {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BundleSink for DirSink {
    fn add(&self, path: &str, mime: &str, data: &[u8]) -> Result<()> {
        // Bundle paths are forward-slash relative identifiers.
        let target = self.root.join(path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| MirrorError::Bundle {
                path: parent.display().to_string(),
                source,
            })?;
        }
        fs::write(&target, data).map_err(|source| MirrorError::Bundle {
            path: target.display().to_string(),
            source,
        })?;
        debug!(path, mime, bytes = data.len(), "wrote bundle entry");
        Ok(())
    }
}

/// A meta-refresh document standing in for a redirect alias.
pub fn redirect_marker(target_id: &str, display_title: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"0;url={target_id}\">\
         <title>{display_title}</title></head>\
         <body><a href=\"{target_id}\">{display_title}</a></body></html>"
    )
}
