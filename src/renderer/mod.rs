//! Renderer module
//!
//! One closed set of render strategies, each matching one capability
//! surface of the remote site:
//!
//! - `ActionParse`: the structured parse API, richest metadata
//! - `WikimediaDesktop`: the desktop REST HTML endpoint
//! - `WikimediaMobile`: the mobile REST HTML endpoint
//! - `RestApi`: the minimal core REST fallback
//! - `VisualEditor`: the edit-API HTML surface
//!
//! `select` is a pure function from requested mode and probed
//! capabilities to one variant. Each variant downloads a raw
//! representation; the transformation into an offline document is shared.

mod action_parse;
mod desktop;
pub mod html;
mod mobile;
mod rest_api;
mod visual_editor;

pub use html::{HtmlContext, ProcessedHtml, PAGINATION_THRESHOLD};

use crate::download::Downloader;
use crate::model::{ArticleDetail, ArticleRedirect, FileDetail};
use crate::probe::CapabilitySet;
use crate::store::Collection;
use crate::{MirrorError, Result};
use url::Url;

/// Raw representation of one article as fetched by a variant.
#[derive(Debug, Clone, Default)]
pub struct RawArticle {
    pub html: String,
    pub display_title: String,
    pub revision_id: u64,
    pub module_deps: Vec<String>,
    pub style_deps: Vec<String>,
    /// Redirect corrections discovered inline (page moves, listed aliases).
    pub redirects: Vec<(String, ArticleRedirect)>,
}

/// Final offline-ready output for one unit.
pub struct RenderedUnit {
    pub html: String,
    pub media: Vec<FileDetail>,
    pub subtitles: Vec<FileDetail>,
    /// Continuation units created by pagination, already persisted.
    pub continuations: Vec<(String, ArticleDetail)>,
}

/// Requested render mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Desktop,
    Mobile,
    Auto,
    Specific(String),
}

impl std::str::FromStr for Mode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "desktop" => Mode::Desktop,
            "mobile" => Mode::Mobile,
            "auto" => Mode::Auto,
            other => Mode::Specific(other.to_string()),
        })
    }
}

/// The closed set of render strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    ActionParse,
    WikimediaDesktop,
    WikimediaMobile,
    RestApi,
    VisualEditor,
}

/// Desktop preference: richest surface first, minimal REST last.
const DESKTOP_ORDER: &[Renderer] = &[
    Renderer::ActionParse,
    Renderer::WikimediaDesktop,
    Renderer::VisualEditor,
    Renderer::RestApi,
];

/// Mobile preference: richest surface, then the mobile REST endpoint.
const MOBILE_ORDER: &[Renderer] = &[Renderer::ActionParse, Renderer::WikimediaMobile];

impl Renderer {
    pub fn name(&self) -> &'static str {
        match self {
            Renderer::ActionParse => "ActionParse",
            Renderer::WikimediaDesktop => "WikimediaDesktop",
            Renderer::WikimediaMobile => "WikimediaMobile",
            Renderer::RestApi => "RestApi",
            Renderer::VisualEditor => "VisualEditor",
        }
    }

    fn from_name(name: &str) -> Option<Renderer> {
        match name {
            "ActionParse" => Some(Renderer::ActionParse),
            "WikimediaDesktop" => Some(Renderer::WikimediaDesktop),
            "WikimediaMobile" => Some(Renderer::WikimediaMobile),
            "RestApi" => Some(Renderer::RestApi),
            "VisualEditor" => Some(Renderer::VisualEditor),
            _ => None,
        }
    }

    fn available(&self, caps: &CapabilitySet) -> bool {
        match self {
            Renderer::ActionParse => caps.action_parse,
            Renderer::WikimediaDesktop => caps.desktop_rest,
            Renderer::WikimediaMobile => caps.mobile_rest,
            Renderer::RestApi => caps.rest_api,
            Renderer::VisualEditor => caps.visual_editor,
        }
    }

    /// Fetches the raw representation of one article.
    pub async fn download(
        &self,
        downloader: &Downloader,
        base: &Url,
        article_id: &str,
    ) -> Result<RawArticle> {
        match self {
            Renderer::ActionParse => action_parse::download(downloader, base, article_id).await,
            Renderer::WikimediaDesktop => desktop::download(downloader, base, article_id).await,
            Renderer::WikimediaMobile => mobile::download(downloader, base, article_id).await,
            Renderer::RestApi => rest_api::download(downloader, base, article_id).await,
            Renderer::VisualEditor => visual_editor::download(downloader, base, article_id).await,
        }
    }

    /// Transforms a raw representation into the final offline document.
    ///
    /// Pagination continuation units are written to the article collection
    /// before this returns, so a reader of a continuation identifier always
    /// finds its detail.
    pub async fn render(
        &self,
        raw: &RawArticle,
        article_id: &str,
        detail: &ArticleDetail,
        articles: &Collection<ArticleDetail>,
        ctx: &HtmlContext<'_>,
    ) -> Result<RenderedUnit> {
        let mut detail = detail.clone();
        let mut continuations = Vec::new();

        if let Some(units) = html::paginate(article_id, &detail) {
            detail = units[0].1.clone();
            continuations = units[1..].to_vec();
            articles.set_many(&units)?;
        }

        let mut body = raw.html.clone();
        if let Some(members) = member_list(&detail, ctx) {
            body.push_str(&members);
        }
        if let Some(nav) = html::pagination_nav(&detail, ctx.article_path_prefix) {
            body.push_str(&nav);
        }

        // Asset bundling happens outside this crate; the dependency lists
        // are surfaced to the caller and only counted here.
        tracing::trace!(
            article_id,
            modules = raw.module_deps.len(),
            styles = raw.style_deps.len(),
            "rendering unit"
        );

        let title = if raw.display_title.is_empty() {
            detail.title.clone()
        } else {
            raw.display_title.clone()
        };
        let processed = html::process_html(&body, article_id, &title, ctx)?;

        Ok(RenderedUnit {
            html: processed.html,
            media: processed.media,
            subtitles: processed.subtitles,
            continuations,
        })
    }
}

/// Builds the document for a pagination continuation unit: its member-page
/// slice plus back/forward navigation.
pub fn render_continuation(
    article_id: &str,
    detail: &ArticleDetail,
    ctx: &HtmlContext<'_>,
) -> Result<ProcessedHtml> {
    let mut body = String::new();
    if let Some(members) = member_list(detail, ctx) {
        body.push_str(&members);
    }
    if let Some(nav) = html::pagination_nav(detail, ctx.article_path_prefix) {
        body.push_str(&nav);
    }
    html::process_html(&body, article_id, &detail.title, ctx)
}

/// Member listing appended to category-like units: sub-categories first,
/// then member pages.
///
/// Links are emitted in site form; the shared anchor rewriter relativizes
/// mirrored targets and unwraps the rest.
fn member_list(detail: &ArticleDetail, ctx: &HtmlContext<'_>) -> Option<String> {
    let mut members: Vec<&String> = Vec::new();
    if let Some(subs) = &detail.sub_categories {
        members.extend(subs);
    }
    if let Some(pages) = &detail.pages {
        members.extend(pages);
    }
    if members.is_empty() {
        return None;
    }

    let mut list = String::from("<ul class=\"mirror-members\">");
    for member in members {
        list.push_str(&format!(
            "<li><a href=\"{}{}\">{}</a></li>",
            ctx.article_path_prefix,
            member,
            member.replace('_', " ")
        ));
    }
    list.push_str("</ul>");
    Some(list)
}

/// Picks the render strategy for a mode given the probed capabilities.
pub fn select(mode: &Mode, caps: &CapabilitySet) -> Result<Renderer> {
    let order: Vec<Renderer> = match mode {
        Mode::Desktop => DESKTOP_ORDER.to_vec(),
        Mode::Mobile => MOBILE_ORDER.to_vec(),
        Mode::Auto => {
            let mut order = DESKTOP_ORDER.to_vec();
            order.push(Renderer::WikimediaMobile);
            order
        }
        Mode::Specific(name) => {
            let variant = Renderer::from_name(name).ok_or_else(|| {
                MirrorError::FatalStartup(format!("unknown renderer {name:?}"))
            })?;
            if variant.available(caps) {
                return Ok(variant);
            }
            return Err(MirrorError::FatalStartup(format!(
                "renderer {} requires a capability the site does not expose",
                variant.name()
            )));
        }
    };

    order
        .into_iter()
        .find(|variant| variant.available(caps))
        .ok_or_else(|| {
            MirrorError::FatalStartup(format!(
                "no renderer available for mode {mode:?} with probed capabilities"
            ))
        })
}

pub(crate) fn encode_title(title: &str) -> String {
    title
        .replace(' ', "_")
        .replace('?', "%3F")
        .replace('&', "%26")
}
