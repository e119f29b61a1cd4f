//! Mobile REST HTML variant

use super::{encode_title, RawArticle};
use crate::download::Downloader;
use crate::Result;
use url::Url;

pub(super) async fn download(
    downloader: &Downloader,
    base: &Url,
    article_id: &str,
) -> Result<RawArticle> {
    let url = base.join(&format!(
        "api/rest_v1/page/mobile-html/{}",
        encode_title(article_id)
    ))?;
    let content = downloader.get_content(url.as_str()).await?;

    Ok(RawArticle {
        html: String::from_utf8_lossy(&content.data).into_owned(),
        display_title: article_id.replace('_', " "),
        ..Default::default()
    })
}
