//! URL prefix compression cache
//!
//! A process-wide ordered mapping from a short numeric token to a
//! previously seen URL prefix (scheme + host + shared base path). Append
//! only for the run's duration: a prefix is assigned a token the first time
//! it is serialized and reused thereafter. Tokens are not stable across
//! runs and must never be persisted outside the run.

use crate::{MirrorError, Result};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct CacheState {
    prefixes: Vec<String>,
    token_by_prefix: HashMap<String, usize>,
}

/// Append-only prefix→token table shared across a run
#[derive(Default)]
pub struct UrlPrefixCache {
    state: Mutex<CacheState>,
}

impl UrlPrefixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `url` into prefix and suffix at the last path slash.
    fn split(url: &str) -> (String, String) {
        // Find the last '/' after the scheme separator so "https://" never
        // splits inside the authority.
        let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
        match url[scheme_end..].rfind('/') {
            Some(rel) => {
                let at = scheme_end + rel + 1;
                (url[..at].to_string(), url[at..].to_string())
            }
            None => (url.to_string(), String::new()),
        }
    }

    /// Compresses a URL to `_<token>_<path>`.
    pub fn serialize_url(&self, url: &str) -> String {
        let (prefix, suffix) = Self::split(url);
        let mut state = self.state.lock().unwrap();
        let token = match state.token_by_prefix.get(&prefix) {
            Some(token) => *token,
            None => {
                state.prefixes.push(prefix.clone());
                let token = state.prefixes.len();
                state.token_by_prefix.insert(prefix, token);
                token
            }
        };
        format!("_{token}_{suffix}")
    }

    /// Reverses [`serialize_url`] for any URL seen in this process.
    pub fn deserialize_url(&self, compressed: &str) -> Result<String> {
        let rest = compressed.strip_prefix('_').ok_or_else(|| {
            MirrorError::InvalidArgument(format!("not a serialized URL: {compressed:?}"))
        })?;
        let (token_str, suffix) = rest.split_once('_').ok_or_else(|| {
            MirrorError::InvalidArgument(format!("not a serialized URL: {compressed:?}"))
        })?;
        let token: usize = token_str.parse().map_err(|_| {
            MirrorError::InvalidArgument(format!("bad URL token: {token_str:?}"))
        })?;

        let state = self.state.lock().unwrap();
        let prefix = state
            .prefixes
            .get(token.wrapping_sub(1))
            .ok_or(MirrorError::InvalidArgument(format!(
                "unknown URL token: {token}"
            )))?;
        Ok(format!("{prefix}{suffix}"))
    }
}
