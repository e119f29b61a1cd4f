//! Desktop REST HTML variant
//!
//! Fetches the rendered desktop document from the REST content endpoint.
//! A missing title is retried once through the page-move log before
//! giving up, since a page renamed after enumeration still exists under
//! its new title.

use super::{encode_title, RawArticle};
use crate::download::Downloader;
use crate::model::ArticleRedirect;
use crate::{MirrorError, Result};
use serde_json::Value;
use tracing::debug;
use url::Url;

pub(super) async fn download(
    downloader: &Downloader,
    base: &Url,
    article_id: &str,
) -> Result<RawArticle> {
    match fetch(downloader, base, article_id).await {
        Ok(raw) => Ok(raw),
        Err(MirrorError::Download(error)) if error.status_code == Some(404) => {
            match moved_target(downloader, base, article_id).await? {
                Some(target) => {
                    debug!(article_id, target, "re-resolved through page-move log");
                    let mut raw = fetch(downloader, base, &target).await?;
                    raw.redirects.push((
                        article_id.to_string(),
                        ArticleRedirect {
                            target_id: target,
                            title: article_id.replace('_', " "),
                        },
                    ));
                    Ok(raw)
                }
                None => Err(MirrorError::Download(error)),
            }
        }
        Err(other) => Err(other),
    }
}

async fn fetch(downloader: &Downloader, base: &Url, article_id: &str) -> Result<RawArticle> {
    let url = base.join(&format!("api/rest_v1/page/html/{}", encode_title(article_id)))?;
    let content = downloader.get_content(url.as_str()).await?;
    let html = String::from_utf8_lossy(&content.data).into_owned();
    let revision_id = revision_from_html(&html);

    Ok(RawArticle {
        revision_id,
        display_title: article_id.replace('_', " "),
        html,
        ..Default::default()
    })
}

/// The REST document carries its revision in an `about` IRI on the root
/// element (`.../revision/12345`).
fn revision_from_html(html: &str) -> u64 {
    html.find("/revision/")
        .map(|idx| {
            html[idx + "/revision/".len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Looks the title up in the page-move log; returns the new title when the
/// page was renamed.
async fn moved_target(
    downloader: &Downloader,
    base: &Url,
    article_id: &str,
) -> Result<Option<String>> {
    let url = base.join(&format!(
        "w/api.php?action=query&format=json&formatversion=2&list=logevents&letype=move&lelimit=1&letitle={}",
        encode_title(article_id)
    ))?;
    let body = match downloader.get_json(url.as_str()).await {
        Ok(body) => body,
        // The move-log lookup is best effort.
        Err(_) => return Ok(None),
    };

    Ok(body
        .get("query")
        .and_then(|q| q.get("logevents"))
        .and_then(Value::as_array)
        .and_then(|events| events.first())
        .and_then(|event| event.get("params"))
        .and_then(|params| params.get("target_title"))
        .and_then(Value::as_str)
        .map(|title| title.replace(' ', "_")))
}
