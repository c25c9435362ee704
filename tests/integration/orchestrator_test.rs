// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_orchestrator, finance_article, serve_page, serve_robots, test_settings};
use serde_json::json;
use siftrs::config::settings::LlmSettings;
use siftrs::domain::models::query::{QueryCategory, ScrapeQuery};
use siftrs::domain::models::scraped_content::ExtractionMethod;
use siftrs::domain::services::llm_service::{LLMService, TextGenerator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn finance_query() -> ScrapeQuery {
    ScrapeQuery::new("low cost index funds", QueryCategory::MutualFunds)
}

fn table(entries: Vec<String>) -> HashMap<String, Vec<String>> {
    HashMap::from([("mutual_funds".to_string(), entries)])
}

#[tokio::test]
async fn test_end_to_end_with_mixed_outcomes() {
    let good = MockServer::start().await;
    serve_page(&good, "/funds", 200, &finance_article("Index Funds 101")).await;

    let blocked = MockServer::start().await;
    serve_robots(&blocked, "User-agent: *\nDisallow: /private/\n").await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&blocked)
        .await;

    let missing = MockServer::start().await;
    serve_page(&missing, "/gone", 404, "not here").await;

    let good_url = format!("{}/funds", good.uri());
    let orchestrator = build_orchestrator(
        &test_settings(),
        None,
        table(vec![
            good_url.clone(),
            format!("{}/private/page", blocked.uri()),
            format!("{}/gone", missing.uri()),
        ]),
    );

    let report = orchestrator.execute(finance_query()).await.unwrap();

    assert_eq!(report.discovered_count, 3);
    assert_eq!(report.success_count, 1);
    assert_eq!(report.failure_count, 2);
    assert!(!report.timed_out);

    assert_eq!(report.results.len(), 1);
    let item = &report.results[0];
    assert_eq!(item.url, good_url);
    assert_eq!(item.extraction_method, ExtractionMethod::Structural);
    assert_eq!(item.title.as_deref(), Some("Index Funds 101"));
    assert!(item.quality() > 0.9);

    assert_eq!(report.error_summary["robots_disallowed"].count, 1);
    assert_eq!(report.error_summary["http_error"].count, 1);
}

#[tokio::test]
async fn test_llm_discovery_feeds_extraction() {
    let site = MockServer::start().await;
    serve_page(&site, "/guide", 200, &finance_article("Choosing Funds")).await;
    let site_url = format!("{}/guide", site.uri());

    let llm_server = MockServer::start().await;
    let suggestion = json!([{
        "url": site_url,
        "title": "Fund guide",
        "relevance_score": 0.9,
        "category": "mutual_funds"
    }])
    .to_string();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": format!("Here you go:\n```json\n{suggestion}\n```")}}]
        })))
        .expect(1)
        .mount(&llm_server)
        .await;

    let llm = LLMService::new(&LlmSettings {
        api_key: Some("test-key".to_string()),
        api_base_url: llm_server.uri(),
        ..Default::default()
    })
    .unwrap();
    assert!(llm.is_available());

    let mut settings = test_settings();
    settings.discovery.enable_llm = true;
    settings.discovery.enable_rules = false;
    let orchestrator = build_orchestrator(
        &settings,
        Some(Arc::new(llm) as Arc<dyn TextGenerator>),
        HashMap::new(),
    );

    let report = orchestrator.execute(finance_query()).await.unwrap();

    assert_eq!(report.discovered_count, 1);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].url, site_url);
    assert_eq!(report.results[0].relevance_score, Some(1.0));
}

#[tokio::test]
async fn test_llm_outage_degrades_to_rules() {
    let site = MockServer::start().await;
    serve_page(&site, "/funds", 200, &finance_article("Fund Basics")).await;

    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&llm_server)
        .await;
    let llm = LLMService::new(&LlmSettings {
        api_key: Some("test-key".to_string()),
        api_base_url: llm_server.uri(),
        ..Default::default()
    })
    .unwrap();

    let mut settings = test_settings();
    settings.discovery.enable_llm = true;
    let orchestrator = build_orchestrator(
        &settings,
        Some(Arc::new(llm) as Arc<dyn TextGenerator>),
        table(vec![format!("{}/funds", site.uri())]),
    );

    let report = orchestrator.execute(finance_query()).await.unwrap();
    assert_eq!(report.results.len(), 1);
}

#[tokio::test]
async fn test_deadline_returns_partial_report() {
    let fast = MockServer::start().await;
    serve_page(&fast, "/funds", 200, &finance_article("Fast Funds")).await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funds"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(finance_article("Slow Funds"))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&slow)
        .await;

    let fast_url = format!("{}/funds", fast.uri());
    let orchestrator = build_orchestrator(
        &test_settings(),
        None,
        table(vec![fast_url.clone(), format!("{}/funds", slow.uri())]),
    );

    let report = orchestrator
        .execute_with_deadline(finance_query(), Duration::from_secs(2))
        .await
        .unwrap();

    assert!(report.timed_out);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].url, fast_url);
}

#[tokio::test]
async fn test_scrape_single_url_with_json_ld_only() {
    let server = MockServer::start().await;
    let body = "Structured data carries the whole article body here, long enough to pass the \
                minimum content length that every extraction strategy must meet.";
    let html = format!(
        r#"<html><head><script type="application/ld+json">{{"@type": "Article", "articleBody": "{body}"}}</script></head>
<body><div>short</div></body></html>"#
    );
    serve_page(&server, "/ld", 200, &html).await;

    let orchestrator = build_orchestrator(&test_settings(), None, HashMap::new());
    let content = orchestrator
        .scrape_single_url(&format!("{}/ld", server.uri()))
        .await
        .unwrap();

    assert_eq!(content.extraction_method, ExtractionMethod::JsonLd);
    assert!(content.fallback_used);
    assert_eq!(content.content, body);
}

#[tokio::test]
async fn test_unknown_category_yields_empty_report() {
    let orchestrator = build_orchestrator(&test_settings(), None, HashMap::new());

    let report = orchestrator
        .execute(ScrapeQuery::new("weather tomorrow", QueryCategory::Unknown))
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.discovered_count, 0);

    let again = orchestrator
        .execute(ScrapeQuery::new("weather tomorrow", QueryCategory::Unknown))
        .await
        .unwrap();
    assert_ne!(report.run_id, again.run_id);
}
