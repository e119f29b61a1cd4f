//! Downloader module
//!
//! All HTTP traffic for the pipeline goes through [`Downloader`]:
//! - JSON API calls with strict body parsing
//! - Raw media/content fetches with an optional optimisation cache
//! - A global retry/backoff policy with per-attempt timeout scaling
//!
//! The downloader performs no classification of terminal failures; it
//! surfaces a typed [`DownloadError`] carrying exactly the fields the error
//! classifier needs.

mod backoff;
mod opt_cache;

pub use backoff::{backoff_delay, retry_if, scaled_timeout, FetchFailure};
pub use opt_cache::OptimisationCache;

use crate::{MirrorError, Result};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Base delay for exponential backoff between retries.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Terminal per-request failure, produced after retries are exhausted.
///
/// Carries the fields the error classifier matches on: URL called, HTTP
/// status (if any), response content type, and response body.
#[derive(Debug, Error)]
#[error("Download failed for {url} (status: {status_code:?})")]
pub struct DownloadError {
    pub url: String,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

/// Raw bytes plus content type, as fetched from the origin or the
/// optimisation cache.
#[derive(Debug, Clone)]
pub struct Content {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Downloader configuration, fixed once per run
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Concurrency multiplier for article and media fan-out.
    pub speed: usize,

    /// Base per-request timeout; scaled up on each retry.
    pub request_timeout: Duration,

    /// Number of additional attempts after the first failure.
    pub max_retries: u32,

    pub user_agent: String,

    /// Optimisation cache base URL; `None` disables that path entirely.
    pub optimisation_cache_url: Option<String>,

    /// Substitute WebP local paths for eligible raster image extensions.
    pub webp: bool,
}

/// Bounded-retry HTTP fetcher
pub struct Downloader {
    client: Client,
    config: DownloaderConfig,
    cache: Option<OptimisationCache>,
}

impl Downloader {
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| MirrorError::FatalStartup(format!("failed to build HTTP client: {e}")))?;

        let cache = config
            .optimisation_cache_url
            .as_deref()
            .map(OptimisationCache::new);

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Fetches and strictly parses a JSON body.
    ///
    /// A body that cannot be fully parsed is a transient failure and goes
    /// back through the retry policy, never surfaced as a partial value.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        self.with_retry(url, |timeout| async move {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| FetchFailure::from_reqwest(url, e))?;

            let status = response.status();
            let content_type = header_string(&response, reqwest::header::CONTENT_TYPE);

            let body = response
                .text()
                .await
                .map_err(|e| FetchFailure::from_reqwest(url, e))?;

            if !status.is_success() {
                return Err(FetchFailure::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    content_type,
                    body: Some(body),
                });
            }

            serde_json::from_str(&body).map_err(|e| FetchFailure::BadBody {
                url: url.to_string(),
                detail: e.to_string(),
            })
        })
        .await
    }

    /// Fetches raw bytes plus content type.
    ///
    /// Media fetches consult the optimisation cache first and fall back to
    /// the origin on a miss, writing the fresh bytes back to the cache.
    pub async fn get_content(&self, url: &str) -> Result<Content> {
        if let Some(cache) = &self.cache {
            let fingerprint = OptimisationCache::fingerprint(url);
            if let Some((data, content_type)) = cache.get(&self.client, &fingerprint).await {
                tracing::trace!("Optimisation cache hit for {url}");
                return Ok(Content { data, content_type });
            }

            let content = self.get_content_from_origin(url).await?;
            cache
                .put(
                    &self.client,
                    &fingerprint,
                    &content.data,
                    &content.content_type,
                )
                .await;
            return Ok(content);
        }

        self.get_content_from_origin(url).await
    }

    async fn get_content_from_origin(&self, url: &str) -> Result<Content> {
        self.with_retry(url, |timeout| async move {
            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| FetchFailure::from_reqwest(url, e))?;

            let status = response.status();
            let content_type = header_string(&response, reqwest::header::CONTENT_TYPE);

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchFailure::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    content_type,
                    body: Some(body),
                });
            }

            let data = response
                .bytes()
                .await
                .map_err(|e| FetchFailure::from_reqwest(url, e))?
                .to_vec();

            Ok(Content {
                data,
                content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            })
        })
        .await
    }

    /// Runs one request through the retry policy: an explicit loop bounded
    /// by the attempt count, with the delay a pure function of the attempt
    /// number and the per-request timeout scaled up per attempt.
    async fn with_retry<'a, T, F, Fut>(&'a self, url: &'a str, attempt_fn: F) -> Result<T>
    where
        F: Fn(Duration) -> Fut,
        Fut: Future<Output = std::result::Result<T, FetchFailure>> + 'a,
    {
        let mut attempt: u32 = 0;
        loop {
            let timeout = scaled_timeout(self.config.request_timeout, attempt);
            match attempt_fn(timeout).await {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    let out_of_attempts = attempt >= self.config.max_retries;
                    if out_of_attempts || !retry_if(&failure) {
                        return Err(MirrorError::Download(failure.into_download_error()));
                    }
                    let delay = backoff_delay(attempt, BACKOFF_BASE);
                    tracing::debug!(
                        "Retrying {url} after {:?} (attempt {} of {}): {failure:?}",
                        delay,
                        attempt + 1,
                        self.config.max_retries + 1,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}
