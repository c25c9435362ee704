// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_fetcher, serve_page, serve_robots, test_settings};
use siftrs::domain::services::extraction_service::{ContentExtraction, ContentExtractorAgent};
use siftrs::utils::errors::{ErrorType, FetchError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::MockServer;

#[tokio::test]
async fn test_same_domain_requests_are_spaced() {
    let server = MockServer::start().await;
    serve_page(&server, "/a", 200, "first").await;
    serve_page(&server, "/b", 200, "second").await;

    let mut settings = test_settings();
    settings.rate_limiter.default_delay_ms = 300;
    let (fetcher, _) = build_fetcher(&settings);

    let start = Instant::now();
    fetcher.fetch(&format!("{}/a", server.uri())).await.unwrap();
    fetcher.fetch(&format!("{}/b", server.uri())).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_different_domains_do_not_wait_on_each_other() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    serve_page(&first, "/", 200, "one").await;
    serve_page(&second, "/", 200, "two").await;

    let mut settings = test_settings();
    settings.rate_limiter.default_delay_ms = 2000;
    let (fetcher, rate_limits) = build_fetcher(&settings);

    let first_url = format!("{}/", first.uri());
    let second_url = format!("{}/", second.uri());
    let start = Instant::now();
    let (a, b) = tokio::join!(fetcher.fetch(&first_url), fetcher.fetch(&second_url),);
    a.unwrap();
    b.unwrap();

    assert!(start.elapsed() < Duration::from_millis(2000));
    // one limiter per host:port
    assert_eq!(rate_limits.len(), 2);
}

#[tokio::test]
async fn test_robots_crawl_delay_raises_domain_delay() {
    let server = MockServer::start().await;
    serve_robots(&server, "User-agent: *\nCrawl-delay: 2\n").await;
    serve_page(&server, "/page", 200, "hello").await;

    let (fetcher, rate_limits) = build_fetcher(&test_settings());
    let url = format!("{}/page", server.uri());

    let page = fetcher.fetch(&url).await.unwrap();
    assert_eq!(page.status_code, 200);
    assert_eq!(page.body, "hello");

    assert_eq!(rate_limits.limiter_for(&url).delay(), Duration::from_secs(2));
}

#[tokio::test]
async fn test_robots_only_blocks_matching_paths() {
    let server = MockServer::start().await;
    serve_robots(&server, "User-agent: *\nAllow: /admin/public\nDisallow: /admin\n").await;
    serve_page(&server, "/admin/public", 200, "open").await;

    let (fetcher, _) = build_fetcher(&test_settings());

    let page = fetcher
        .fetch(&format!("{}/admin/public", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.body, "open");

    let err = fetcher
        .fetch(&format!("{}/admin/secret", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "robots_disallowed");
}

#[tokio::test]
async fn test_extractor_rejects_oversized_pages() {
    let server = MockServer::start().await;
    serve_page(&server, "/big", 200, &"x".repeat(4096)).await;

    let settings = test_settings();
    let (fetcher, _) = build_fetcher(&settings);
    let extractor = Arc::new(ContentExtractorAgent::new(
        fetcher,
        settings.extraction.clone(),
        1024,
    ));

    let err = extractor
        .extract(&format!("{}/big", server.uri()))
        .await
        .unwrap_err();

    match err {
        FetchError::Scraping(e) => {
            assert_eq!(e.error_type, ErrorType::ContentTooLarge);
            assert!(!e.can_retry);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_url_is_rejected_before_any_request() {
    let (fetcher, rate_limits) = build_fetcher(&test_settings());

    let err = fetcher.fetch("ftp://files.example.com/x").await.unwrap_err();

    assert!(matches!(err, FetchError::InvalidUrl(_)));
    assert!(rate_limits.is_empty());
}
