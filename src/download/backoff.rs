//! Retry/backoff policy
//!
//! Every request made by the downloader is classified into a
//! [`FetchFailure`] and run through [`retry_if`]. The policy is the part
//! that prevents retry storms: transient connectivity problems and
//! truncated bodies retry with exponential delay, while any failure
//! carrying a concrete HTTP status is treated as a semantic answer from the
//! origin and never retried.

use crate::download::DownloadError;
use std::time::Duration;

/// Classified outcome of a single failed request attempt
#[derive(Debug)]
pub enum FetchFailure {
    /// Socket-level timeout.
    Timeout { url: String },

    /// Connection could not be established.
    Connect { url: String },

    /// The response body could not be fully parsed: either a direct JSON
    /// syntax error from strict parsing, or a parse failure wrapped as the
    /// cause of a higher-level transport error. Both mean the origin sent a
    /// truncated or malformed body under load and both retry.
    BadBody { url: String, detail: String },

    /// Any other socket/transport error without an HTTP status.
    Transport { url: String, detail: String },

    /// The origin answered with a concrete HTTP status. Never retried: a
    /// 404 or 403 will not improve on the next attempt, even if the body
    /// happens to contain parse-error text.
    Status {
        url: String,
        status: u16,
        content_type: Option<String>,
        body: Option<String>,
    },
}

impl FetchFailure {
    /// Classifies a reqwest error for the given URL.
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                url: url.to_string(),
            };
        }
        if error.is_connect() {
            return Self::Connect {
                url: url.to_string(),
            };
        }
        // A decode failure is a parse error wrapped as the transport
        // error's cause.
        if error.is_decode() {
            return Self::BadBody {
                url: url.to_string(),
                detail: error.to_string(),
            };
        }
        if let Some(status) = error.status() {
            return Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
                content_type: None,
                body: None,
            };
        }
        Self::Transport {
            url: url.to_string(),
            detail: error.to_string(),
        }
    }

    /// Converts an exhausted failure into the terminal per-request error.
    pub fn into_download_error(self) -> DownloadError {
        match self {
            Self::Status {
                url,
                status,
                content_type,
                body,
            } => DownloadError {
                url,
                status_code: Some(status),
                content_type,
                body,
            },
            Self::Timeout { url }
            | Self::Connect { url } => DownloadError {
                url,
                status_code: None,
                content_type: None,
                body: None,
            },
            Self::BadBody { url, detail } | Self::Transport { url, detail } => DownloadError {
                url,
                status_code: None,
                content_type: None,
                body: Some(detail),
            },
        }
    }
}

/// Decides whether a failed attempt should be retried.
pub fn retry_if(failure: &FetchFailure) -> bool {
    match failure {
        FetchFailure::Timeout { .. } => true,
        FetchFailure::Connect { .. } => true,
        FetchFailure::BadBody { .. } => true,
        FetchFailure::Transport { .. } => true,
        FetchFailure::Status { .. } => false,
    }
}

/// Backoff delay as a pure function of the attempt number (0-based).
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(1u32 << attempt.min(6))
}

/// Per-request timeout, scaled up on each successive retry to tolerate a
/// congested origin without retrying forever at the same timeout.
pub fn scaled_timeout(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt + 1)
}
