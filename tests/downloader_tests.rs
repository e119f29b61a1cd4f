//! Integration tests for the downloader
//!
//! These tests use wiremock to exercise the retry policy and the
//! optimisation cache path against real HTTP round trips.

use std::time::Duration;
use wikimirror::download::{Downloader, DownloaderConfig, OptimisationCache};
use wikimirror::MirrorError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(cache_url: Option<String>) -> DownloaderConfig {
    DownloaderConfig {
        speed: 4,
        request_timeout: Duration::from_secs(5),
        max_retries: 2,
        user_agent: "wikimirror-test/0.1".to_string(),
        optimisation_cache_url: cache_url,
        webp: false,
    }
}

#[tokio::test]
async fn test_truncated_json_body_is_retried_until_it_parses() {
    let server = MockServer::start().await;

    // First answer is truncated mid-object; the follow-up parses.
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"parse": {"title""#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"parse": {"title": "Earth"}}"#),
        )
        .mount(&server)
        .await;

    let downloader = Downloader::new(test_config(None)).unwrap();
    let body = downloader
        .get_json(&format!("{}/api", server.uri()))
        .await
        .unwrap();
    assert_eq!(body["parse"]["title"], "Earth");
}

#[tokio::test]
async fn test_http_404_is_never_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string("Unexpected token < in JSON at position 0"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloader = Downloader::new(test_config(None)).unwrap();
    let outcome = downloader
        .get_json(&format!("{}/gone", server.uri()))
        .await;

    match outcome {
        Err(MirrorError::Download(error)) => {
            assert_eq!(error.status_code, Some(404));
            assert!(error.body.unwrap().contains("Unexpected token"));
        }
        other => panic!("expected download error, got {other:?}"),
    }

    // The expect(1) above is verified on drop: no retry happened.
    server.verify().await;
}

#[tokio::test]
async fn test_content_carries_bytes_and_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"png-bytes".to_vec())
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let downloader = Downloader::new(test_config(None)).unwrap();
    let content = downloader
        .get_content(&format!("{}/img.png", server.uri()))
        .await
        .unwrap();
    assert_eq!(content.data, b"png-bytes");
    assert_eq!(content.content_type, "image/png");
}

#[tokio::test]
async fn test_optimisation_cache_hit_short_circuits_origin() {
    let origin = MockServer::start().await;
    let cache = MockServer::start().await;

    let media_url = format!("{}/img.png", origin.uri());
    let fingerprint = OptimisationCache::fingerprint(&media_url);

    // The origin must never be contacted on a cache hit.
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"origin-bytes".to_vec()))
        .expect(0)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{fingerprint}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"cached-bytes".to_vec())
                .insert_header("content-type", "image/webp"),
        )
        .mount(&cache)
        .await;

    let downloader = Downloader::new(test_config(Some(cache.uri()))).unwrap();
    let content = downloader.get_content(&media_url).await.unwrap();
    assert_eq!(content.data, b"cached-bytes");
    assert_eq!(content.content_type, "image/webp");

    origin.verify().await;
}

#[tokio::test]
async fn test_optimisation_cache_miss_falls_back_and_writes_back() {
    let origin = MockServer::start().await;
    let cache = MockServer::start().await;

    let media_url = format!("{}/img.png", origin.uri());
    let fingerprint = OptimisationCache::fingerprint(&media_url);

    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"origin-bytes".to_vec())
                .insert_header("content-type", "image/png"),
        )
        .expect(1)
        .mount(&origin)
        .await;
    // Cache answers miss on lookup but accepts the write-back.
    Mock::given(method("GET"))
        .and(path(format!("/{fingerprint}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&cache)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{fingerprint}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&cache)
        .await;

    let downloader = Downloader::new(test_config(Some(cache.uri()))).unwrap();
    let content = downloader.get_content(&media_url).await.unwrap();
    assert_eq!(content.data, b"origin-bytes");

    origin.verify().await;
    cache.verify().await;
}
