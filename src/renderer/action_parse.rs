//! Structured parse API variant
//!
//! Fetches through `action=parse`, the richest surface: article HTML plus
//! module/style dependency lists plus redirect corrections in one response.

use super::{encode_title, RawArticle};
use crate::download::{DownloadError, Downloader};
use crate::model::ArticleRedirect;
use crate::{MirrorError, Result};
use serde_json::Value;
use url::Url;

pub(super) async fn download(
    downloader: &Downloader,
    base: &Url,
    article_id: &str,
) -> Result<RawArticle> {
    let url = base.join(&format!(
        "w/api.php?action=parse&format=json&formatversion=2&prop=text|modules|displaytitle&redirects=1&page={}",
        encode_title(article_id)
    ))?;
    let body = downloader.get_json(url.as_str()).await?;

    let parse = match body.get("parse") {
        Some(parse) => parse,
        // The API reports missing titles as 200 with an error envelope.
        None => {
            return Err(MirrorError::Download(DownloadError {
                url: url.to_string(),
                status_code: None,
                content_type: Some("application/json".to_string()),
                body: Some(body.to_string()),
            }));
        }
    };

    let revision_id = parse.get("revid").and_then(Value::as_u64).unwrap_or(0);
    // A zero revision marks a page deleted between listing and fetch.
    if revision_id == 0 {
        return Err(MirrorError::DeletedArticle {
            article_id: article_id.to_string(),
        });
    }

    // A success envelope without a text body is malformed, not deleted.
    let html = match parse.get("text").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => {
            return Err(MirrorError::Render {
                article_id: article_id.to_string(),
                message: "parse envelope carries no text body".to_string(),
            });
        }
    };
    let display_title = parse
        .get("displaytitle")
        .and_then(Value::as_str)
        .unwrap_or(article_id)
        .to_string();

    let redirects = parse
        .get("redirects")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let from = entry.get("from")?.as_str()?;
                    let to = entry.get("to")?.as_str()?;
                    Some((
                        from.replace(' ', "_"),
                        ArticleRedirect {
                            target_id: to.replace(' ', "_"),
                            title: from.to_string(),
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RawArticle {
        html,
        display_title,
        revision_id,
        module_deps: string_list(parse.get("modules")),
        style_deps: string_list(parse.get("modulestyles")),
        redirects,
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
