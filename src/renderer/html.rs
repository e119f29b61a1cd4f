//! Shared HTML transformation
//!
//! Every renderer variant funnels its raw document through `process_html`:
//! link rewriting, media extraction into the download queue, header
//! injection, and the footer block. Pagination of oversized member lists
//! is a separate step because it creates new content units.

use crate::model::{ArticleDetail, FileDetail};
use crate::urlrw::{self, RewriteAction};
use crate::Result;
use dom_query::{Document, Selection};
use tracing::trace;
use url::Url;

/// Member-page count above which a unit is split into continuation units.
pub const PAGINATION_THRESHOLD: usize = 200;

/// Inputs that hold for every unit of one run.
pub struct HtmlContext<'a> {
    pub base: &'a Url,
    pub article_path_prefix: &'a str,
    pub webp: bool,
    pub is_mirrored: &'a (dyn Fn(&str) -> bool + Send + Sync),
}

/// A transformed document plus the dependencies it references.
pub struct ProcessedHtml {
    pub html: String,
    pub media: Vec<FileDetail>,
    pub subtitles: Vec<FileDetail>,
}

/// Rewrites links, extracts media, injects a header when missing, and
/// appends the footer block.
pub fn process_html(
    raw: &str,
    article_id: &str,
    display_title: &str,
    ctx: &HtmlContext<'_>,
) -> Result<ProcessedHtml> {
    let doc = Document::from(raw);
    let mut media = Vec::new();
    let mut subtitles = Vec::new();
    let depth_prefix = "../".repeat(article_id.matches('/').count());

    rewrite_anchors(&doc, article_id, ctx, &depth_prefix, &mut media)?;
    collect_images(&doc, ctx, &depth_prefix, &mut media);
    collect_av(&doc, ctx, &depth_prefix, &mut media, &mut subtitles);

    if doc.select("h1").length() == 0 {
        doc.select("body")
            .prepend_html(format!("<h1>{}</h1>", display_title));
    }

    doc.select("body").append_html(format!(
        "<footer class=\"mirror-footer\"><p>Snapshot of <a href=\"{}\">{}</a>.</p></footer>",
        ctx.base, display_title
    ));

    trace!(
        article_id,
        media = media.len(),
        subtitles = subtitles.len(),
        "processed document"
    );

    Ok(ProcessedHtml {
        html: doc.html().to_string(),
        media,
        subtitles,
    })
}

fn rewrite_anchors(
    doc: &Document,
    article_id: &str,
    ctx: &HtmlContext<'_>,
    depth_prefix: &str,
    media: &mut Vec<FileDetail>,
) -> Result<()> {
    for node in doc.select("a[href]").nodes() {
        let sel = Selection::from(*node);
        let href = match sel.attr("href") {
            Some(href) => href.to_string(),
            None => continue,
        };

        let action = match urlrw::rewrite_href(
            &href,
            article_id,
            ctx.base,
            ctx.article_path_prefix,
            ctx.webp,
            ctx.is_mirrored,
        ) {
            Ok(action) => action,
            // An unparseable href is left alone rather than failing the unit.
            Err(_) => continue,
        };

        match action {
            RewriteAction::Keep => {}
            RewriteAction::Geo(uri) | RewriteAction::External(uri) => {
                sel.set_attr("href", &uri);
            }
            RewriteAction::Relative(path) => {
                sel.set_attr("href", &path);
            }
            RewriteAction::Media { url, path } => {
                // Linked media is queued exactly like embedded media.
                media.push(FileDetail {
                    url,
                    multiplier: 1.0,
                    width: None,
                });
                sel.set_attr("href", &format!("{depth_prefix}{path}"));
            }
            RewriteAction::Unwrap => {
                let inner = sel.inner_html().to_string();
                sel.replace_with_html(inner);
            }
        }
    }
    Ok(())
}

fn collect_images(
    doc: &Document,
    ctx: &HtmlContext<'_>,
    depth_prefix: &str,
    media: &mut Vec<FileDetail>,
) {
    for node in doc.select("img[src]").nodes() {
        let sel = Selection::from(*node);
        let src = match sel.attr("src") {
            Some(src) => src.to_string(),
            None => continue,
        };
        let absolute = match resolve(ctx.base, &src) {
            Some(url) => url,
            None => continue,
        };

        let width = sel
            .attr("width")
            .and_then(|w| w.parse::<u32>().ok())
            .or_else(|| sel.attr("data-file-width").and_then(|w| w.parse().ok()));

        media.push(FileDetail {
            url: absolute.clone(),
            multiplier: 1.0,
            width,
        });

        // High-density variants from srcset become their own queue entries.
        if let Some(srcset) = sel.attr("srcset") {
            for (variant, multiplier) in parse_srcset(&srcset) {
                if let Some(variant_url) = resolve(ctx.base, &variant) {
                    media.push(FileDetail {
                        url: variant_url,
                        multiplier,
                        width,
                    });
                }
            }
            sel.remove_attr("srcset");
        }

        let local = urlrw::media_path(&absolute, ctx.webp);
        sel.set_attr("src", &format!("{depth_prefix}{local}"));
    }
}

fn collect_av(
    doc: &Document,
    ctx: &HtmlContext<'_>,
    depth_prefix: &str,
    media: &mut Vec<FileDetail>,
    subtitles: &mut Vec<FileDetail>,
) {
    for node in doc.select("video source[src], audio source[src]").nodes() {
        let sel = Selection::from(*node);
        if let Some(url) = sel.attr("src").and_then(|s| resolve(ctx.base, &s)) {
            media.push(FileDetail {
                url: url.clone(),
                multiplier: 1.0,
                width: None,
            });
            // AV sources never go through WebP substitution.
            sel.set_attr("src", &format!("{depth_prefix}{}", urlrw::media_path(&url, false)));
        }
    }

    for node in doc.select("track[src]").nodes() {
        let sel = Selection::from(*node);
        if let Some(url) = sel.attr("src").and_then(|s| resolve(ctx.base, &s)) {
            subtitles.push(FileDetail {
                url: url.clone(),
                multiplier: 1.0,
                width: None,
            });
            sel.set_attr("src", &format!("{depth_prefix}{}", urlrw::media_path(&url, false)));
        }
    }
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Parses `srcset` into (url, density-multiplier) pairs. Width descriptors
/// are skipped; only density descriptors map onto the multiplier field.
fn parse_srcset(srcset: &str) -> Vec<(String, f64)> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?.to_string();
            let descriptor = parts.next()?;
            let multiplier = descriptor.strip_suffix('x')?.parse::<f64>().ok()?;
            Some((url, multiplier))
        })
        .collect()
}

/// Splits an oversized member-page list into continuation units.
///
/// Returns the trimmed head unit plus the continuation units in order.
/// Identifiers use a double-underscore numeric suffix so siblings sort
/// together and share a base identifier.
pub fn paginate(article_id: &str, detail: &ArticleDetail) -> Option<Vec<(String, ArticleDetail)>> {
    let pages = detail.pages.as_ref()?;
    if pages.len() <= PAGINATION_THRESHOLD {
        return None;
    }

    let chunks: Vec<&[String]> = pages.chunks(PAGINATION_THRESHOLD).collect();
    let unit_id = |n: usize| {
        if n == 0 {
            article_id.to_string()
        } else {
            format!("{article_id}__{n}")
        }
    };

    let mut units = Vec::with_capacity(chunks.len());
    for (n, chunk) in chunks.iter().enumerate() {
        let mut unit = detail.clone();
        unit.pages = Some(chunk.to_vec());
        unit.prev_id = if n > 0 { Some(unit_id(n - 1)) } else { None };
        unit.next_id = if n + 1 < chunks.len() {
            Some(unit_id(n + 1))
        } else {
            None
        };
        units.push((unit_id(n), unit));
    }
    Some(units)
}

/// Back/forward navigation block for a paginated unit.
///
/// Links are emitted in site form so the anchor rewriter relativizes them
/// together with the document's own links.
pub fn pagination_nav(detail: &ArticleDetail, article_path_prefix: &str) -> Option<String> {
    if detail.prev_id.is_none() && detail.next_id.is_none() {
        return None;
    }
    let mut nav = String::from("<nav class=\"mirror-pagination\">");
    if let Some(prev) = &detail.prev_id {
        nav.push_str(&format!(
            "<a href=\"{article_path_prefix}{prev}\">previous</a> "
        ));
    }
    if let Some(next) = &detail.next_id {
        nav.push_str(&format!("<a href=\"{article_path_prefix}{next}\">next</a>"));
    }
    nav.push_str("</nav>");
    Some(nav)
}
