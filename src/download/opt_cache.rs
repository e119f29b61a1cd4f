//! Optimisation cache client
//!
//! An external store of pre-processed media keyed by content fingerprint.
//! The downloader consults it before fetching media from the origin and
//! writes freshly fetched bytes back when configured to do so. Absence of
//! configuration disables this path entirely with no behavior change
//! otherwise.

use reqwest::Client;
use sha2::{Digest, Sha256};

/// GET-by-fingerprint / PUT-by-fingerprint client
pub struct OptimisationCache {
    base_url: String,
}

impl OptimisationCache {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Content fingerprint for a media URL.
    pub fn fingerprint(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn entry_url(&self, fingerprint: &str) -> String {
        format!("{}/{}", self.base_url, fingerprint)
    }

    /// Looks up cached bytes. A miss (404) or any transport failure falls
    /// back to the origin; the cache is an optimisation, never a source of
    /// truth.
    pub async fn get(&self, client: &Client, fingerprint: &str) -> Option<(Vec<u8>, String)> {
        let url = self.entry_url(fingerprint);
        let response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!("Optimisation cache lookup failed for {url}: {error}");
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        match response.bytes().await {
            Ok(bytes) => Some((bytes.to_vec(), content_type)),
            Err(error) => {
                tracing::debug!("Optimisation cache body read failed for {url}: {error}");
                None
            }
        }
    }

    /// Writes freshly fetched bytes back. Best-effort: a failed write-back
    /// is logged and ignored.
    pub async fn put(&self, client: &Client, fingerprint: &str, data: &[u8], content_type: &str) {
        let url = self.entry_url(fingerprint);
        let outcome = client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data.to_vec())
            .send()
            .await;

        match outcome {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::debug!(
                    "Optimisation cache write-back for {url} answered {}",
                    response.status()
                );
            }
            Err(error) => {
                tracing::debug!("Optimisation cache write-back failed for {url}: {error}");
            }
        }
    }
}
