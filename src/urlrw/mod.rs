//! URL rewriting module
//!
//! Converts absolute or scheme-relative site URLs into relative offline
//! paths. Each special case is a fixed rule evaluated in priority order:
//! geo-extraction links, mirrored article links, unmirrored article links,
//! external links, in-page hash links, media resource links. The prefix
//! compression cache shares this module because the rewriter is its main
//! client.

mod cache;

pub use cache::UrlPrefixCache;

use crate::Result;
use sha2::{Digest, Sha256};
use url::Url;

/// File extensions treated as media resources.
const MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "webm", "mp4", "ogg", "ogv", "mp3", "pdf", "vtt",
];

/// Extensions eligible for WebP substitution of the local path.
const WEBP_CONVERTIBLE: &[&str] = &["png", "jpg", "jpeg"];

/// Outcome of rewriting one anchor href
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteAction {
    /// Replace the href with a `geo:<lat>,<lon>` pseudo-URL.
    Geo(String),

    /// Replace the href with a relative offline path to a mirrored page.
    Relative(String),

    /// The target is not mirrored: delete the link, keeping its content.
    Unwrap,

    /// Keep as an absolute external URL (https-forced when the original
    /// was protocol-relative).
    External(String),

    /// Leave the href untouched (in-page hash links).
    Keep,

    /// Replace the href with the local media store path; carries the
    /// absolute source URL so the caller can queue the download.
    Media { url: String, path: String },
}

/// Rewrites one href relative to the page that references it.
///
/// `source_id` is the offline identifier of the referencing page;
/// `is_mirrored` answers whether an article identifier is part of this run.
/// `webp` applies WebP substitution to local media paths.
pub fn rewrite_href(
    href: &str,
    source_id: &str,
    base: &Url,
    article_path_prefix: &str,
    webp: bool,
    is_mirrored: &dyn Fn(&str) -> bool,
) -> Result<RewriteAction> {
    // In-page hash links stay untouched.
    if href.starts_with('#') {
        return Ok(RewriteAction::Keep);
    }

    // Protocol-relative links resolve as https before any other rule.
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        Url::parse(&format!("https://{rest}"))?
    } else {
        base.join(href)?
    };

    // Geo-coordinate extraction links drop the HTTP layer entirely.
    if let Some(geo) = geo_pseudo_url(&absolute) {
        return Ok(RewriteAction::Geo(geo));
    }

    let same_host = absolute.host_str() == base.host_str();

    if same_host {
        if let Some(target) = article_id_from_path(absolute.path(), article_path_prefix) {
            if is_mirrored(&target) {
                return Ok(RewriteAction::Relative(relative_path(source_id, &target)));
            }
            return Ok(RewriteAction::Unwrap);
        }
        if is_media_url(&absolute) {
            return Ok(RewriteAction::Media {
                path: media_path(absolute.as_str(), webp),
                url: absolute.into(),
            });
        }
        // Same-host pages outside the article tree are not mirrored.
        return Ok(RewriteAction::Unwrap);
    }

    if is_media_url(&absolute) {
        return Ok(RewriteAction::Media {
            path: media_path(absolute.as_str(), webp),
            url: absolute.into(),
        });
    }

    Ok(RewriteAction::External(absolute.to_string()))
}

/// Extracts the article identifier from a same-host path, if the path is
/// under the article tree.
pub fn article_id_from_path(path: &str, article_path_prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(article_path_prefix)?;
    if rest.is_empty() {
        return None;
    }
    let decoded = percent_decode(rest);
    Some(decoded.replace(' ', "_"))
}

/// Relative path from the offline location of `source_id` to `target_id`.
///
/// Both identifiers map to bundle paths verbatim; the hop count is the
/// directory depth of the source.
pub fn relative_path(source_id: &str, target_id: &str) -> String {
    let depth = source_id.matches('/').count();
    let mut out = String::new();
    for _ in 0..depth {
        out.push_str("../");
    }
    out.push_str(target_id);
    out
}

/// Local media store path, bucketed by content hash of the source URL.
pub fn media_path(url: &str, webp: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = hex::encode(hasher.finalize());

    let ext = url
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.split(['?', '#']).next().unwrap_or(ext).to_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    let ext = if webp && WEBP_CONVERTIBLE.contains(&ext.as_str()) {
        "webp".to_string()
    } else {
        ext
    };

    format!("I/{}/{}.{}", &hash[..2], hash, ext)
}

fn is_media_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    MEDIA_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{ext}")))
}

/// Recognizes a geo-extraction service link and converts its coordinate
/// parameters into a `geo:` pseudo-URL.
fn geo_pseudo_url(url: &Url) -> Option<String> {
    if !url.host_str()?.contains("geohack") {
        return None;
    }
    let params = url
        .query_pairs()
        .find(|(key, _)| key == "params")
        .map(|(_, value)| value.to_string())?;
    let (lat, lon) = parse_geohack_params(&params)?;
    Some(format!("geo:{lat},{lon}"))
}

/// Parses geohack coordinate strings: degree[_minute[_second]] runs each
/// terminated by a hemisphere letter, e.g. `51.507_N_0.127_W` or
/// `27_59_17_N_86_55_31_E`.
fn parse_geohack_params(params: &str) -> Option<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;
    let mut parts: Vec<f64> = Vec::new();

    for token in params.split('_') {
        match token {
            "N" | "S" => {
                let value = combine_dms(&parts)?;
                lat = Some(if token == "S" { -value } else { value });
                parts.clear();
            }
            "E" | "W" => {
                let value = combine_dms(&parts)?;
                lon = Some(if token == "W" { -value } else { value });
                parts.clear();
            }
            other => {
                match other.parse::<f64>() {
                    Ok(value) => parts.push(value),
                    // Trailing qualifiers like "type:city" end the run.
                    Err(_) => break,
                }
            }
        }
        if lat.is_some() && lon.is_some() {
            break;
        }
    }

    Some((lat?, lon?))
}

fn combine_dms(parts: &[f64]) -> Option<f64> {
    match parts {
        [deg] => Some(*deg),
        [deg, min] => Some(deg + min / 60.0),
        [deg, min, sec] => Some(deg + min / 60.0 + sec / 3600.0),
        _ => None,
    }
}

fn percent_decode(input: &str) -> String {
    let mut out = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
