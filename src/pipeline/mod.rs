//! Harvest pipeline
//!
//! One [`Session`] owns everything a run needs: the probed capability set,
//! the selected renderers, the downloader, the store-backed collections,
//! the URL prefix cache, and the bundle sink. A run proceeds in phases:
//!
//! 1. enumerate the content list and redirect aliases into the store
//! 2. render every article under bounded concurrency, queueing media
//! 3. drain the media queue, moving failures to the retry queue once
//! 4. emit redirect markers
//! 5. flush the work queues and log run statistics
//!
//! Per-unit failures never abort a run: they are classified, counted, and
//! replaced with a placeholder document at the unit's expected path.

mod stats;

pub use stats::{KindStats, RunStats, RunSummary};

use crate::bundle::{redirect_marker, BundleSink, DirSink};
use crate::classify;
use crate::config::Config;
use crate::download::{Downloader, DownloaderConfig};
use crate::exec;
use crate::model::{
    article_field_table, collections, file_field_table, redirect_field_table, ArticleDetail,
    ArticleRedirect, FileDetail, RunRecord, Thumbnail,
};
use crate::probe::{self, CapabilitySet};
use crate::renderer::{self, HtmlContext, Mode, Renderer};
use crate::store::{self, Collection, KeyValueStore};
use crate::urlrw::{self, UrlPrefixCache};
use crate::{MirrorError, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

/// Titles per enumeration request.
const ENUMERATION_PAGE_SIZE: usize = 500;

/// Redirect targets resolved per lookup request.
const REDIRECT_RESOLVE_BATCH: usize = 50;

/// Longest redirect chain followed while flattening.
const REDIRECT_CHAIN_LIMIT: usize = 5;

/// MediaWiki namespace number of category pages.
const CATEGORY_NAMESPACE: i32 = 14;

/// Requested thumbnail width in pixels.
const THUMBNAIL_WIDTH: u32 = 320;

/// One harvest run: configuration, probed capabilities, selected
/// renderers, store collections, and the bundle sink.
pub struct Session {
    config: Config,
    base: Url,
    capabilities: CapabilitySet,
    runs: Collection<RunRecord>,
    ctx: Arc<RenderCtx>,
}

/// The shared state every concurrent worker needs.
struct RenderCtx {
    downloader: Arc<Downloader>,
    base: Url,
    article_path_prefix: String,
    main_page: String,
    article_renderer: Renderer,
    main_page_renderer: Renderer,
    articles: Collection<ArticleDetail>,
    files_to_download: Collection<FileDetail>,
    files_to_retry: Collection<FileDetail>,
    redirects: Collection<ArticleRedirect>,
    url_cache: UrlPrefixCache,
    sink: Arc<dyn BundleSink>,
    stats: Arc<RunStats>,
    /// Continuation unit ids already emitted this run. Pagination writes
    /// continuation entries into the article collection mid-scan; the scan
    /// may visit them again, and this set keeps each emitted exactly once.
    emitted_continuations: Mutex<HashSet<String>>,
}

impl Session {
    /// Opens the store and bundle directory from the configuration, probes
    /// the target site, and selects renderers for the requested mode.
    pub async fn start(config: Config) -> Result<Self> {
        let sink: Arc<dyn BundleSink> =
            Arc::new(DirSink::create(Path::new(&config.output.bundle_dir))?);
        let store = store::open_store(Path::new(&config.store.database_path))?;
        Self::start_with(config, store, sink).await
    }

    /// Like [`Session::start`] with an explicit store and sink.
    pub async fn start_with(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn BundleSink>,
    ) -> Result<Self> {
        let base = Url::parse(&config.harvest.base_url)?;
        let downloader = Arc::new(Downloader::new(DownloaderConfig {
            speed: config.harvest.speed as usize,
            request_timeout: config.request_timeout(),
            max_retries: config.downloader.max_retries,
            user_agent: config.user_agent_string(),
            optimisation_cache_url: config
                .optimisation_cache
                .as_ref()
                .map(|cache| cache.base_url.clone()),
            webp: config.downloader.webp,
        })?);

        let capabilities = probe::probe_capabilities(&downloader, &base, config.probe_page()).await?;

        let mode = config.mode();
        let article_renderer = renderer::select(&mode, &capabilities)?;
        // The main page always prefers the desktop surface; a mobile-only
        // site falls back to the article renderer.
        let main_page_renderer = renderer::select(&Mode::Desktop, &capabilities)
            .unwrap_or(article_renderer);
        info!(
            article_renderer = article_renderer.name(),
            main_page_renderer = main_page_renderer.name(),
            "selected renderers"
        );

        let articles = Collection::new(
            Arc::clone(&store),
            collections::ARTICLES,
            Some(article_field_table()),
        )?;
        let files_to_download = Collection::new(
            Arc::clone(&store),
            collections::FILES_TO_DOWNLOAD,
            Some(file_field_table()),
        )?;
        let files_to_retry = Collection::new(
            Arc::clone(&store),
            collections::FILES_TO_RETRY,
            Some(file_field_table()),
        )?;
        let redirects = Collection::new(
            Arc::clone(&store),
            collections::REDIRECTS,
            Some(redirect_field_table()),
        )?;
        // Run records are few; no field compression.
        let runs = Collection::new(Arc::clone(&store), collections::RUNS, None)?;

        let ctx = Arc::new(RenderCtx {
            downloader,
            base: base.clone(),
            article_path_prefix: config.harvest.article_path_prefix.clone(),
            main_page: config.harvest.main_page.replace(' ', "_"),
            article_renderer,
            main_page_renderer,
            articles,
            files_to_download,
            files_to_retry,
            redirects,
            url_cache: UrlPrefixCache::new(),
            sink,
            stats: Arc::new(RunStats::default()),
            emitted_continuations: Mutex::new(HashSet::new()),
        });

        Ok(Self {
            config,
            base,
            capabilities,
            runs,
            ctx,
        })
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Runs the full harvest.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.runs.set(
            &started_at,
            &RunRecord {
                started_at: started_at.clone(),
                finished_at: None,
                articles_ok: 0,
                articles_failed: 0,
                media_ok: 0,
                media_failed: 0,
                redirects: 0,
            },
        )?;

        self.enumerate().await?;
        self.render_articles().await?;
        self.drain_media().await?;
        self.emit_redirects()?;
        self.teardown()?;
        self.ctx.stats.log_summary();

        let summary = self.ctx.stats.snapshot();
        self.runs.set(
            &started_at,
            &RunRecord {
                started_at: started_at.clone(),
                finished_at: Some(chrono::Utc::now().to_rfc3339()),
                articles_ok: summary.articles_ok,
                articles_failed: summary.articles_soft_failed + summary.articles_hard_failed,
                media_ok: summary.media_ok,
                media_failed: summary.media_soft_failed + summary.media_hard_failed,
                redirects: summary.redirects,
            },
        )?;
        Ok(summary)
    }

    /// Probes and enumerates without fetching any content.
    pub async fn dry_run(&self) -> Result<RunSummary> {
        self.enumerate().await?;
        let articles = self.ctx.articles.len().map_err(MirrorError::from)?;
        let redirects = self.ctx.redirects.len().map_err(MirrorError::from)?;
        info!(articles, redirects, "dry run complete, nothing fetched");
        Ok(self.ctx.stats.snapshot())
    }

    /// Enumerates the content list and redirect aliases into the store.
    async fn enumerate(&self) -> Result<()> {
        for namespace in [0, CATEGORY_NAMESPACE] {
            self.enumerate_namespace(namespace).await?;
        }

        // The main page may live outside the enumerated namespaces.
        let main_id = self.config.harvest.main_page.replace(' ', "_");
        if self.ctx.articles.get(&main_id)?.is_none() {
            self.ctx
                .articles
                .set(&main_id, &ArticleDetail::new(main_id.replace('_', " ")))?;
        }

        self.enumerate_category_members().await?;
        self.enumerate_thumbnails().await?;
        self.enumerate_redirects().await?;

        let articles = self.ctx.articles.len().map_err(MirrorError::from)?;
        let redirects = self.ctx.redirects.len().map_err(MirrorError::from)?;
        info!(articles, redirects, "enumerated content list");
        Ok(())
    }

    async fn enumerate_namespace(&self, namespace: i32) -> Result<()> {
        let mut batch: Vec<(String, ArticleDetail)> = Vec::new();
        let mut continue_from: Option<String> = None;

        loop {
            let mut url = format!(
                "w/api.php?action=query&format=json&formatversion=2&list=allpages&apfilterredir=nonredirects&apnamespace={}&aplimit={}",
                namespace, ENUMERATION_PAGE_SIZE
            );
            if let Some(from) = &continue_from {
                url.push_str(&format!("&apcontinue={}", from.replace(' ', "_")));
            }
            let body = self
                .ctx
                .downloader
                .get_json(self.base.join(&url)?.as_str())
                .await?;

            for page in pages_in(&body) {
                let title = page.replace('_', " ");
                let id = page.replace(' ', "_");
                let mut detail = ArticleDetail::new(title);
                detail.namespace = namespace;
                batch.push((id, detail));
            }
            if !batch.is_empty() {
                self.ctx.articles.set_many(&batch)?;
                batch.clear();
            }

            continue_from = continuation_in(&body);
            if continue_from.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Fills in the member listing of every category unit. Oversized
    /// listings are split into continuation units at render time.
    async fn enumerate_category_members(&self) -> Result<()> {
        for id in self.ctx.articles.keys().map_err(MirrorError::from)? {
            let Some(mut detail) = self.ctx.articles.get(&id)? else {
                continue;
            };
            if detail.namespace != CATEGORY_NAMESPACE {
                continue;
            }

            let mut pages: Vec<String> = Vec::new();
            let mut sub_categories: Vec<String> = Vec::new();
            let mut continue_from: Option<String> = None;
            loop {
                let mut url = format!(
                    "w/api.php?action=query&format=json&formatversion=2&list=categorymembers&cmtitle={}&cmlimit={}",
                    id.replace('&', "%26"),
                    ENUMERATION_PAGE_SIZE
                );
                if let Some(from) = &continue_from {
                    url.push_str(&format!("&cmcontinue={from}"));
                }
                let body = self
                    .ctx
                    .downloader
                    .get_json(self.base.join(&url)?.as_str())
                    .await?;

                for (member, namespace) in category_members_in(&body) {
                    if namespace == CATEGORY_NAMESPACE {
                        sub_categories.push(member);
                    } else {
                        pages.push(member);
                    }
                }
                continue_from = body
                    .get("continue")
                    .and_then(|c| c.get("cmcontinue"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if continue_from.is_none() {
                    break;
                }
            }

            if pages.is_empty() && sub_categories.is_empty() {
                continue;
            }
            debug!(
                category = id.as_str(),
                pages = pages.len(),
                sub_categories = sub_categories.len(),
                "enumerated category members"
            );
            detail.pages = (!pages.is_empty()).then_some(pages);
            detail.sub_categories = (!sub_categories.is_empty()).then_some(sub_categories);
            self.ctx.articles.set(&id, &detail)?;
        }
        Ok(())
    }

    /// Attaches thumbnail descriptors to the enumerated articles and queues
    /// the thumbnail sources with the rest of the media.
    async fn enumerate_thumbnails(&self) -> Result<()> {
        let ids = self.ctx.articles.keys().map_err(MirrorError::from)?;
        let webp = self.ctx.downloader.config().webp;
        for chunk in ids.chunks(REDIRECT_RESOLVE_BATCH) {
            let url = self.base.join(&format!(
                "w/api.php?action=query&format=json&formatversion=2&prop=pageimages&piprop=thumbnail&pithumbsize={}&titles={}",
                THUMBNAIL_WIDTH,
                chunk.join("|").replace('&', "%26")
            ))?;
            // Thumbnails are decoration; a failed lookup never blocks a run.
            let body = match self.ctx.downloader.get_json(url.as_str()).await {
                Ok(body) => body,
                Err(MirrorError::Download(error)) => {
                    debug!(%error, "thumbnail lookup failed, continuing without");
                    continue;
                }
                Err(fatal) => return Err(fatal),
            };

            for (id, thumbnail) in thumbnails_in(&body) {
                let Some(mut detail) = self.ctx.articles.get(&id)? else {
                    continue;
                };
                let key = self.ctx.url_cache.serialize_url(&thumbnail.source);
                self.ctx.files_to_download.set(
                    &key,
                    &FileDetail {
                        url: thumbnail.source.clone(),
                        multiplier: 1.0,
                        width: Some(thumbnail.width),
                    },
                )?;
                detail.internal_thumbnail_path = Some(urlrw::media_path(&thumbnail.source, webp));
                detail.thumbnail = Some(thumbnail);
                self.ctx.articles.set(&id, &detail)?;
            }
        }
        Ok(())
    }

    /// Enumerates redirect aliases and flattens chains at write time.
    async fn enumerate_redirects(&self) -> Result<()> {
        let mut aliases: Vec<String> = Vec::new();
        let mut continue_from: Option<String> = None;

        loop {
            let mut url = format!(
                "w/api.php?action=query&format=json&formatversion=2&list=allpages&apfilterredir=redirects&aplimit={}",
                ENUMERATION_PAGE_SIZE
            );
            if let Some(from) = &continue_from {
                url.push_str(&format!("&apcontinue={}", from.replace(' ', "_")));
            }
            let body = self
                .ctx
                .downloader
                .get_json(self.base.join(&url)?.as_str())
                .await?;
            aliases.extend(pages_in(&body));
            continue_from = continuation_in(&body);
            if continue_from.is_none() {
                break;
            }
        }

        if aliases.is_empty() {
            return Ok(());
        }

        // Resolve targets in batches; the hop map is flattened below so
        // readers never follow more than one hop.
        let mut hops: HashMap<String, String> = HashMap::new();
        for chunk in aliases.chunks(REDIRECT_RESOLVE_BATCH) {
            let titles = chunk
                .iter()
                .map(|t| t.replace('_', " "))
                .collect::<Vec<_>>()
                .join("|");
            let url = self.base.join(&format!(
                "w/api.php?action=query&format=json&formatversion=2&redirects=1&titles={}",
                titles.replace(' ', "_").replace('&', "%26")
            ))?;
            let body = self.ctx.downloader.get_json(url.as_str()).await?;
            if let Some(entries) = body
                .get("query")
                .and_then(|q| q.get("redirects"))
                .and_then(Value::as_array)
            {
                for entry in entries {
                    if let (Some(from), Some(to)) = (
                        entry.get("from").and_then(Value::as_str),
                        entry.get("to").and_then(Value::as_str),
                    ) {
                        hops.insert(from.replace(' ', "_"), to.replace(' ', "_"));
                    }
                }
            }
        }

        let mut resolved: Vec<(String, ArticleRedirect)> = Vec::new();
        for alias in &aliases {
            let alias_id = alias.replace(' ', "_");
            let mut target = match hops.get(&alias_id) {
                Some(target) => target.clone(),
                None => continue,
            };
            for _ in 0..REDIRECT_CHAIN_LIMIT {
                match hops.get(&target) {
                    Some(next) if *next != target => target = next.clone(),
                    _ => break,
                }
            }
            resolved.push((
                alias_id.clone(),
                ArticleRedirect {
                    target_id: target,
                    title: alias_id.replace('_', " "),
                },
            ));
        }
        self.ctx.redirects.set_many(&resolved)?;
        Ok(())
    }

    /// Renders every enumerated article under bounded concurrency.
    async fn render_articles(&self) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let workers = self.ctx.downloader.config().speed;
        self.ctx
            .articles
            .iterate_items(workers, move |batch, _active| {
                let ctx = Arc::clone(&ctx);
                async move {
                    for (article_id, detail) in batch {
                        process_article(&ctx, &article_id, &detail).await?;
                    }
                    Ok(())
                }
            })
            .await
    }

    /// Fetches every queued media file; a failed entry moves to the retry
    /// queue exactly once, then fails for good on the second pass.
    async fn drain_media(&self) -> Result<()> {
        self.drain_queue(&self.ctx.files_to_download, true).await?;
        self.drain_queue(&self.ctx.files_to_retry, false).await
    }

    async fn drain_queue(
        &self,
        queue: &Collection<FileDetail>,
        move_to_retry: bool,
    ) -> Result<()> {
        let collected: Arc<Mutex<Vec<(String, FileDetail)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_handle = Arc::clone(&collected);
        queue
            .iterate_items(1, move |batch, _active| {
                let collected = Arc::clone(&sink_handle);
                async move {
                    collected.lock().unwrap().extend(batch);
                    Ok(())
                }
            })
            .await?;

        let entries = std::mem::take(&mut *collected.lock().unwrap());
        if entries.is_empty() {
            return Ok(());
        }
        debug!(
            queue = queue.name(),
            entries = entries.len(),
            "draining media queue"
        );

        let ctx = Arc::clone(&self.ctx);
        let queue = queue.clone();
        let speed = self.ctx.downloader.config().speed;
        exec::map_with_concurrency(entries, speed, move |(key, file)| {
            let ctx = Arc::clone(&ctx);
            let queue = queue.clone();
            async move { fetch_media(&ctx, &queue, move_to_retry, &key, &file).await }
        })
        .await?;
        Ok(())
    }

    /// Writes a meta-refresh marker document for every redirect alias.
    fn emit_redirects(&self) -> Result<()> {
        for alias in self.ctx.redirects.keys().map_err(MirrorError::from)? {
            let Some(redirect) = self.ctx.redirects.get(&alias)? else {
                continue;
            };
            let target = urlrw::relative_path(&alias, &redirect.target_id);
            self.ctx.sink.add(
                &alias,
                "text/html",
                redirect_marker(&target, &redirect.title).as_bytes(),
            )?;
            self.ctx.stats.record_redirect();
        }
        Ok(())
    }

    /// Empties the work queues. Article metadata stays for inspection.
    fn teardown(&self) -> Result<()> {
        self.ctx.files_to_download.flush()?;
        self.ctx.files_to_retry.flush()?;
        Ok(())
    }
}

/// Renders one article, catching every per-unit failure at this boundary.
async fn process_article(ctx: &RenderCtx, article_id: &str, detail: &ArticleDetail) -> Result<()> {
    // Continuation units render from their stored member-page slice, never
    // from the origin; the base unit that split them usually already has.
    if detail.prev_id.is_some() {
        if !mark_continuation_emitted(ctx, article_id) {
            return Ok(());
        }
        emit_continuation(ctx, article_id, detail)?;
        ctx.stats.articles.record_success();
        return Ok(());
    }

    let renderer = if article_id == ctx.main_page {
        ctx.main_page_renderer
    } else {
        ctx.article_renderer
    };

    match render_unit(ctx, renderer, article_id, detail).await {
        Ok(()) => {
            ctx.stats.articles.record_success();
            Ok(())
        }
        Err(MirrorError::Download(error)) => {
            let rule = classify::classify(&error);
            let name = rule.map(|r| r.name).unwrap_or("unclassified");
            warn!(article_id, rule = name, %error, "article failed, emitting placeholder");
            emit_placeholder(ctx, article_id, detail, rule)
        }
        Err(MirrorError::DeletedArticle { .. }) => {
            debug!(article_id, "article deleted between listing and fetch");
            emit_placeholder(ctx, article_id, detail, Some(classify::deleted_article_rule()))
        }
        Err(MirrorError::Render { message, .. }) => {
            warn!(article_id, message, "render failed, emitting placeholder");
            ctx.stats.articles.record_hard_failure();
            mark_missing(ctx, article_id, detail)?;
            let placeholder = classify::render_placeholder(None, article_id, &detail.title);
            ctx.sink.add(article_id, "text/html", placeholder.as_bytes())
        }
        Err(fatal) => Err(fatal),
    }
}

fn emit_placeholder(
    ctx: &RenderCtx,
    article_id: &str,
    detail: &ArticleDetail,
    rule: Option<&'static classify::MatchingRule>,
) -> Result<()> {
    if rule.map(|r| r.hard).unwrap_or(false) {
        ctx.stats.articles.record_hard_failure();
    } else {
        ctx.stats.articles.record_soft_failure();
    }
    mark_missing(ctx, article_id, detail)?;
    let placeholder = classify::render_placeholder(rule, article_id, &detail.title);
    ctx.sink.add(article_id, "text/html", placeholder.as_bytes())
}

/// Records a failed fetch on the stored metadata.
fn mark_missing(ctx: &RenderCtx, article_id: &str, detail: &ArticleDetail) -> Result<()> {
    let mut updated = detail.clone();
    updated.missing = true;
    Ok(ctx.articles.set(article_id, &updated)?)
}

async fn render_unit(
    ctx: &RenderCtx,
    renderer: Renderer,
    article_id: &str,
    detail: &ArticleDetail,
) -> Result<()> {
    let raw = renderer.download(&ctx.downloader, &ctx.base, article_id).await?;

    // Redirect corrections discovered inline join the alias collection.
    if !raw.redirects.is_empty() {
        ctx.redirects.set_many(&raw.redirects)?;
    }

    let articles = ctx.articles.clone();
    let is_mirrored = move |id: &str| matches!(articles.get(id), Ok(Some(_)));
    let hctx = HtmlContext {
        base: &ctx.base,
        article_path_prefix: &ctx.article_path_prefix,
        webp: ctx.downloader.config().webp,
        is_mirrored: &is_mirrored,
    };

    let rendered = renderer
        .render(&raw, article_id, detail, &ctx.articles, &hctx)
        .await?;

    for file in rendered.media.iter().chain(rendered.subtitles.iter()) {
        let key = ctx.url_cache.serialize_url(&file.url);
        ctx.files_to_download.set(&key, file)?;
    }

    ctx.sink
        .add(article_id, "text/html", rendered.html.as_bytes())?;

    for (continuation_id, continuation) in &rendered.continuations {
        if !mark_continuation_emitted(ctx, continuation_id) {
            continue;
        }
        emit_continuation(ctx, continuation_id, continuation)?;
        ctx.stats.articles.record_success();
    }

    Ok(())
}

/// Claims a continuation id for emission; false when already emitted.
fn mark_continuation_emitted(ctx: &RenderCtx, continuation_id: &str) -> bool {
    ctx.emitted_continuations
        .lock()
        .unwrap()
        .insert(continuation_id.to_string())
}

/// Writes one continuation unit from its stored detail.
fn emit_continuation(ctx: &RenderCtx, continuation_id: &str, detail: &ArticleDetail) -> Result<()> {
    let articles = ctx.articles.clone();
    let is_mirrored = move |id: &str| matches!(articles.get(id), Ok(Some(_)));
    let hctx = HtmlContext {
        base: &ctx.base,
        article_path_prefix: &ctx.article_path_prefix,
        webp: ctx.downloader.config().webp,
        is_mirrored: &is_mirrored,
    };

    let page = renderer::render_continuation(continuation_id, detail, &hctx)?;
    for file in &page.media {
        let key = ctx.url_cache.serialize_url(&file.url);
        ctx.files_to_download.set(&key, file)?;
    }
    ctx.sink
        .add(continuation_id, "text/html", page.html.as_bytes())
}

/// Fetches one queued media file; failures never abort the drain.
async fn fetch_media(
    ctx: &RenderCtx,
    queue: &Collection<FileDetail>,
    move_to_retry: bool,
    key: &str,
    file: &FileDetail,
) -> Result<()> {
    match ctx.downloader.get_content(&file.url).await {
        Ok(content) => {
            // The stored path must match what the document rewriter linked,
            // so eligibility follows the URL extension, not the served MIME.
            let path = urlrw::media_path(&file.url, ctx.downloader.config().webp);
            ctx.sink.add(&path, &content.content_type, &content.data)?;
            queue.delete(key)?;
            ctx.stats.media.record_success();
            Ok(())
        }
        Err(MirrorError::Download(error)) => {
            queue.delete(key)?;
            if move_to_retry {
                debug!(url = %file.url, %error, "media fetch failed, queueing retry");
                ctx.files_to_retry.set(key, file)?;
                Ok(())
            } else {
                let hard = classify::classify(&error).map(|r| r.hard).unwrap_or(false);
                warn!(url = %file.url, %error, "media fetch failed for good");
                if hard {
                    ctx.stats.media.record_hard_failure();
                } else {
                    ctx.stats.media.record_soft_failure();
                }
                Ok(())
            }
        }
        Err(fatal) => Err(fatal),
    }
}

fn pages_in(body: &Value) -> Vec<String> {
    body.get("query")
        .and_then(|q| q.get("allpages"))
        .and_then(Value::as_array)
        .map(|pages| {
            pages
                .iter()
                .filter_map(|page| page.get("title").and_then(Value::as_str))
                .map(|title| title.replace(' ', "_"))
                .collect()
        })
        .unwrap_or_default()
}

fn continuation_in(body: &Value) -> Option<String> {
    body.get("continue")
        .and_then(|c| c.get("apcontinue"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extracts (member id, namespace) pairs from a categorymembers response.
fn category_members_in(body: &Value) -> Vec<(String, i32)> {
    body.get("query")
        .and_then(|q| q.get("categorymembers"))
        .and_then(Value::as_array)
        .map(|members| {
            members
                .iter()
                .filter_map(|member| {
                    let title = member.get("title").and_then(Value::as_str)?;
                    let namespace = member.get("ns").and_then(Value::as_i64).unwrap_or(0) as i32;
                    Some((title.replace(' ', "_"), namespace))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts (article id, thumbnail) pairs from a pageimages response.
fn thumbnails_in(body: &Value) -> Vec<(String, Thumbnail)> {
    body.get("query")
        .and_then(|q| q.get("pages"))
        .and_then(Value::as_array)
        .map(|pages| {
            pages
                .iter()
                .filter_map(|page| {
                    let title = page.get("title").and_then(Value::as_str)?;
                    let thumb = page.get("thumbnail")?;
                    Some((
                        title.replace(' ', "_"),
                        Thumbnail {
                            source: thumb.get("source")?.as_str()?.to_string(),
                            width: thumb.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
                            height: thumb.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}
