//! Integration tests for the full harvest pipeline
//!
//! These tests use wiremock to stand in for a MediaWiki-style site and run
//! a complete session end-to-end: probe, enumerate, render, media drain,
//! redirect markers.

use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wikimirror::bundle::{BundleSink, DirSink};
use wikimirror::config::{
    Config, DownloaderSection, HarvestConfig, OutputConfig, StoreConfig, UserAgentConfig,
};
use wikimirror::model::{article_field_table, collections};
use wikimirror::store::{Collection, KeyValueStore, MemoryStore};
use wikimirror::{ArticleDetail, Session};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the given mock site
fn create_test_config(base_url: &str, bundle_dir: &str) -> Config {
    Config {
        harvest: HarvestConfig {
            base_url: base_url.to_string(),
            mode: "auto".to_string(),
            main_page: "Main_Page".to_string(),
            probe_page: None,
            speed: 4,
            article_path_prefix: "/wiki/".to_string(),
        },
        user_agent: UserAgentConfig {
            name: "wikimirror-test".to_string(),
            version: "0.1".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        downloader: DownloaderSection {
            request_timeout_ms: 5000,
            max_retries: 1,
            webp: false,
        },
        store: StoreConfig {
            database_path: "./unused.db".to_string(),
        },
        output: OutputConfig {
            bundle_dir: bundle_dir.to_string(),
        },
        optimisation_cache: None,
    }
}

fn parse_response(title: &str, revid: u64, text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "parse": {
            "title": title,
            "pageid": 1,
            "revid": revid,
            "text": text,
            "displaytitle": title,
            "modules": ["site"],
            "modulestyles": ["site.styles"],
        }
    }))
}

/// Mounts the three enumeration passes: mainspace articles, category
/// pages, and redirect aliases.
async fn mount_enumeration(
    server: &MockServer,
    mainspace: serde_json::Value,
    categories: serde_json::Value,
    redirect_aliases: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "allpages"))
        .and(query_param("apfilterredir", "nonredirects"))
        .and(query_param("apnamespace", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": true,
            "query": {"allpages": mainspace}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "allpages"))
        .and(query_param("apfilterredir", "nonredirects"))
        .and(query_param("apnamespace", "14"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": true,
            "query": {"allpages": categories}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "allpages"))
        .and(query_param("apfilterredir", "redirects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"allpages": redirect_aliases}
        })))
        .mount(server)
        .await;
}

/// Mounts the probe, enumeration, and per-article mocks for a small site
/// where only the structured parse surface answers.
async fn mount_site(server: &MockServer) {
    // Enumeration: two real pages plus the main page, one redirect alias.
    mount_enumeration(
        server,
        json!([
            {"pageid": 1, "ns": 0, "title": "Earth"},
            {"pageid": 2, "ns": 0, "title": "Main Page"},
            {"pageid": 3, "ns": 0, "title": "Vanished"},
        ]),
        json!([]),
        json!([{"pageid": 4, "ns": 0, "title": "Terra"}]),
    )
    .await;

    // The redirect alias resolves to Earth.
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("redirects", "1"))
        .and(query_param("titles", "Terra"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"redirects": [{"from": "Terra", "to": "Earth"}]}
        })))
        .mount(server)
        .await;

    // Article bodies through action=parse. The main page doubles as the
    // capability probe target.
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("page", "Main_Page"))
        .respond_with(parse_response(
            "Main Page",
            100,
            "<html><body><h1>Main Page</h1>\
             <p><a href=\"/wiki/Earth\">Earth</a></p></body></html>",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("page", "Earth"))
        .respond_with(parse_response(
            "Earth",
            101,
            &format!(
                "<html><body><h1>Earth</h1>\
                 <p><a href=\"/wiki/Main_Page\">home</a> and \
                 <a href=\"/wiki/Obscure\">a missing page</a></p>\
                 <img src=\"{}/images/earth.png\" width=\"220\">\
                 </body></html>",
                server.uri()
            ),
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("page", "Vanished"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}
        })))
        .mount(server)
        .await;

    // The one media file referenced by Earth.
    Mock::given(method("GET"))
        .and(path("/images/earth.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"png-bytes".to_vec())
                .insert_header("content-type", "image/png"),
        )
        .mount(server)
        .await;
}

async fn start_session(server: &MockServer, bundle: &TempDir) -> (Session, Arc<dyn KeyValueStore>) {
    let config = create_test_config(&server.uri(), bundle.path().to_str().unwrap());
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let sink: Arc<dyn BundleSink> = Arc::new(DirSink::create(bundle.path()).unwrap());
    let session = Session::start_with(config, Arc::clone(&store), sink)
        .await
        .unwrap();
    (session, store)
}

fn stored_article(store: &Arc<dyn KeyValueStore>, id: &str) -> Option<ArticleDetail> {
    let articles: Collection<ArticleDetail> = Collection::new(
        Arc::clone(store),
        collections::ARTICLES,
        Some(article_field_table()),
    )
    .unwrap();
    articles.get(id).unwrap()
}

fn read_bundle(bundle: &TempDir, name: &str) -> String {
    fs::read_to_string(bundle.path().join(name)).unwrap()
}

fn find_media_file(root: &Path) -> Option<std::path::PathBuf> {
    let buckets = fs::read_dir(root.join("I")).ok()?;
    for bucket in buckets.flatten() {
        if let Some(entry) = fs::read_dir(bucket.path()).ok()?.flatten().next() {
            return Some(entry.path());
        }
    }
    None
}

#[tokio::test]
async fn test_full_harvest_produces_link_consistent_bundle() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let bundle = TempDir::new().unwrap();

    let (session, _store) = start_session(&server, &bundle).await;

    // Only the parse surface answered the probes.
    assert!(session.capabilities().action_parse);
    assert!(!session.capabilities().desktop_rest);

    let summary = session.run().await.unwrap();

    // Two articles rendered; the vanished one soft-failed.
    assert_eq!(summary.articles_ok, 2);
    assert_eq!(summary.articles_soft_failed, 1);
    assert_eq!(summary.articles_hard_failed, 0);
    assert_eq!(summary.media_ok, 1);
    assert_eq!(summary.redirects, 1);

    // Mirrored links are relative; unmirrored ones are unwrapped.
    let earth = read_bundle(&bundle, "Earth");
    assert!(earth.contains("<a href=\"Main_Page\">home</a>"));
    assert!(!earth.contains("/wiki/Obscure"));
    assert!(earth.contains("a missing page"));
    assert!(earth.contains("src=\"I/"));

    // The media file landed under its content-hash bucket.
    let media = find_media_file(bundle.path()).expect("media file in bundle");
    assert_eq!(fs::read(&media).unwrap(), b"png-bytes");
    assert!(media.extension().is_some_and(|ext| ext == "png"));
}

#[tokio::test]
async fn test_failed_article_occupies_its_path_with_a_placeholder() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let bundle = TempDir::new().unwrap();

    let (session, store) = start_session(&server, &bundle).await;
    session.run().await.unwrap();

    // The deleted article still exists at its expected path.
    let placeholder = read_bundle(&bundle, "Vanished");
    assert!(placeholder.contains("deleted from the source site"));
    // Deletion is permanent: no "try again later" suggestion.
    assert!(!placeholder.contains("try again later"));

    // The stored metadata records the failed fetch.
    assert!(stored_article(&store, "Vanished").unwrap().missing);
    assert!(!stored_article(&store, "Earth").unwrap().missing);
}

#[tokio::test]
async fn test_redirect_alias_gets_a_marker_document() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let bundle = TempDir::new().unwrap();

    let (session, _store) = start_session(&server, &bundle).await;
    session.run().await.unwrap();

    let marker = read_bundle(&bundle, "Terra");
    assert!(marker.contains("url=Earth"));
    assert!(marker.contains("Terra"));
}

#[tokio::test]
async fn test_dry_run_enumerates_without_fetching_content() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let bundle = TempDir::new().unwrap();

    let (session, _store) = start_session(&server, &bundle).await;
    let summary = session.dry_run().await.unwrap();

    assert_eq!(summary.articles_ok, 0);
    assert_eq!(summary.media_ok, 0);
    // No article documents were written.
    assert!(!bundle.path().join("Earth").exists());
}

#[tokio::test]
async fn test_webp_substitution_keeps_links_and_files_aligned() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let bundle = TempDir::new().unwrap();

    let mut config = create_test_config(&server.uri(), bundle.path().to_str().unwrap());
    config.downloader.webp = true;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let sink: Arc<dyn BundleSink> = Arc::new(DirSink::create(bundle.path()).unwrap());
    let session = Session::start_with(config, store, sink).await.unwrap();
    session.run().await.unwrap();

    let earth = read_bundle(&bundle, "Earth");
    let src = earth
        .split("src=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .expect("image src in document");
    assert!(src.ends_with(".webp"));
    // The fetched file sits at exactly the path the document links.
    assert!(bundle.path().join(src).exists());
}

#[tokio::test]
async fn test_category_unit_lists_its_members() {
    let server = MockServer::start().await;
    mount_enumeration(
        &server,
        json!([
            {"pageid": 1, "ns": 0, "title": "Earth"},
            {"pageid": 2, "ns": 0, "title": "Main Page"},
        ]),
        json!([{"pageid": 5, "ns": 14, "title": "Category:Planets"}]),
        json!([]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "categorymembers"))
        .and(query_param("cmtitle", "Category:Planets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"categorymembers": [
                {"pageid": 1, "ns": 0, "title": "Earth"},
                {"pageid": 9, "ns": 0, "title": "Mars"},
                {"pageid": 6, "ns": 14, "title": "Category:Moons"},
            ]}
        })))
        .mount(&server)
        .await;
    for (page, title) in [
        ("Main_Page", "Main Page"),
        ("Earth", "Earth"),
        ("Category:Planets", "Category:Planets"),
    ] {
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "parse"))
            .and(query_param("page", page))
            .respond_with(parse_response(
                title,
                50,
                &format!("<html><body><h1>{title}</h1></body></html>"),
            ))
            .mount(&server)
            .await;
    }
    let bundle = TempDir::new().unwrap();

    let (session, store) = start_session(&server, &bundle).await;
    session.run().await.unwrap();

    // Mirrored members are linked; unmirrored ones stay plain text.
    let category = read_bundle(&bundle, "Category:Planets");
    assert!(category.contains("<a href=\"Earth\">Earth</a>"));
    assert!(category.contains("<li>Mars</li>"));
    assert!(category.contains("Category:Moons"));
    assert!(!category.contains("href=\"Category:Moons\""));

    let detail = stored_article(&store, "Category:Planets").unwrap();
    assert_eq!(detail.pages.as_ref().unwrap().len(), 2);
    assert_eq!(detail.sub_categories.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn test_thumbnails_recorded_and_fetched_with_media() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("prop", "pageimages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"pages": [{
                "pageid": 1,
                "title": "Earth",
                "thumbnail": {
                    "source": format!("{}/images/earth-thumb.jpg", server.uri()),
                    "width": 320,
                    "height": 240
                }
            }]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/earth-thumb.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"jpeg-bytes".to_vec())
                .insert_header("content-type", "image/jpeg"),
        )
        .mount(&server)
        .await;
    let bundle = TempDir::new().unwrap();

    let (session, store) = start_session(&server, &bundle).await;
    session.run().await.unwrap();

    let earth = stored_article(&store, "Earth").unwrap();
    assert_eq!(earth.thumbnail.as_ref().unwrap().width, 320);

    // The cached thumbnail path points at the fetched file.
    let thumb_path = earth.internal_thumbnail_path.unwrap();
    assert!(thumb_path.ends_with(".jpg"));
    assert_eq!(
        fs::read(bundle.path().join(&thumb_path)).unwrap(),
        b"jpeg-bytes"
    );
}

#[tokio::test]
async fn test_malformed_parse_body_hard_fails_with_placeholder() {
    let server = MockServer::start().await;
    mount_enumeration(
        &server,
        json!([
            {"pageid": 1, "ns": 0, "title": "Main Page"},
            {"pageid": 2, "ns": 0, "title": "Broken"},
        ]),
        json!([]),
        json!([]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("page", "Main_Page"))
        .respond_with(parse_response(
            "Main Page",
            100,
            "<html><body><h1>Main Page</h1></body></html>",
        ))
        .mount(&server)
        .await;
    // A success envelope with no text body at all.
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("page", "Broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "parse": {"title": "Broken", "pageid": 2, "revid": 7, "displaytitle": "Broken"}
        })))
        .mount(&server)
        .await;
    let bundle = TempDir::new().unwrap();

    let (session, store) = start_session(&server, &bundle).await;
    let summary = session.run().await.unwrap();

    assert_eq!(summary.articles_ok, 1);
    assert_eq!(summary.articles_hard_failed, 1);

    let placeholder = read_bundle(&bundle, "Broken");
    assert!(placeholder.contains("could not be fetched"));
    assert!(stored_article(&store, "Broken").unwrap().missing);
}
