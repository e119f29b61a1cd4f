//! Edit-API HTML variant
//!
//! Fetches the rendered document through the visual-editor parse action.
//! Shares the deleted-page marker with the structured parse surface: a
//! zero-valued `oldid` means the page vanished after enumeration.

use super::{encode_title, RawArticle};
use crate::download::{DownloadError, Downloader};
use crate::{MirrorError, Result};
use serde_json::Value;
use url::Url;

pub(super) async fn download(
    downloader: &Downloader,
    base: &Url,
    article_id: &str,
) -> Result<RawArticle> {
    let url = base.join(&format!(
        "w/api.php?action=visualeditor&format=json&formatversion=2&paction=parse&page={}",
        encode_title(article_id)
    ))?;
    let body = downloader.get_json(url.as_str()).await?;

    let editor = match body.get("visualeditor") {
        Some(editor) => editor,
        None => {
            return Err(MirrorError::Download(DownloadError {
                url: url.to_string(),
                status_code: None,
                content_type: Some("application/json".to_string()),
                body: Some(body.to_string()),
            }));
        }
    };

    let revision_id = editor.get("oldid").and_then(Value::as_u64).unwrap_or(0);
    if revision_id == 0 {
        return Err(MirrorError::DeletedArticle {
            article_id: article_id.to_string(),
        });
    }

    let html = match editor.get("content").and_then(Value::as_str) {
        Some(content) => content.to_string(),
        None => {
            return Err(MirrorError::Render {
                article_id: article_id.to_string(),
                message: "visualeditor envelope carries no content body".to_string(),
            });
        }
    };

    Ok(RawArticle {
        html,
        display_title: article_id.replace('_', " "),
        revision_id,
        ..Default::default()
    })
}
