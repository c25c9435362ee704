// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use siftrs::config::settings::Settings;
use siftrs::domain::services::discovery_service::SiteDiscoveryAgent;
use siftrs::domain::services::extraction_service::ContentExtractorAgent;
use siftrs::domain::services::llm_service::TextGenerator;
use siftrs::domain::services::rate_limiting_service::RateLimitManager;
use siftrs::domain::services::scraper_orchestrator::ScraperOrchestrator;
use siftrs::engines::fetcher::{build_http_client, HttpFetcher};
use siftrs::utils::robots::RobotsChecker;
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 快速重试、无域名间隔、仅规则发现的测试配置
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.scraper.max_retries = 1;
    settings.scraper.retry_backoff_ms = 10;
    settings.scraper.request_timeout_secs = 5;
    settings.rate_limiter.default_delay_ms = 0;
    settings.discovery.enable_llm = false;
    settings
}

pub fn build_fetcher(settings: &Settings) -> (Arc<HttpFetcher>, Arc<RateLimitManager>) {
    let rate_limits = Arc::new(RateLimitManager::from_settings(&settings.rate_limiter));
    let client = build_http_client(&settings.scraper).expect("http client");
    let robots = Arc::new(RobotsChecker::new(
        client.clone(),
        &settings.scraper,
        &settings.robots,
        Some(rate_limits.clone()),
    ));
    let fetcher = Arc::new(HttpFetcher::new(
        client,
        robots,
        rate_limits.clone(),
        &settings.scraper,
    ));
    (fetcher, rate_limits)
}

pub fn build_orchestrator(
    settings: &Settings,
    llm: Option<Arc<dyn TextGenerator>>,
    table: HashMap<String, Vec<String>>,
) -> ScraperOrchestrator {
    let (fetcher, _) = build_fetcher(settings);
    let discovery =
        SiteDiscoveryAgent::new(llm, settings.discovery.clone()).with_domain_table(table);
    let extractor = ContentExtractorAgent::new(
        fetcher,
        settings.extraction.clone(),
        settings.scraper.content_size_limit,
    );
    ScraperOrchestrator::new(Arc::new(discovery), Arc::new(extractor), settings)
}

/// 一篇足够长、带完整元数据的基金文章
pub fn finance_article(title: &str) -> String {
    let paragraph = "Low cost index funds track a broad market index, keep expense ratios \
                     small and let long term investors compound returns with minimal turnover.";
    format!(
        r#"<html><head>
<title>{title}</title>
<meta name="description" content="How index funds keep investing simple">
<meta name="author" content="Research Desk">
<meta property="article:published_time" content="2024-05-01T09:00:00Z">
</head><body>
<nav>Home</nav>
<article>
<h1>{title}</h1>
<p>{paragraph}</p>
<p>Comparing fund families starts with fees: {paragraph}</p>
<p>Portfolio construction matters too. {paragraph}</p>
<p>Finally, rebalancing once a year is usually enough. {paragraph}</p>
</article>
</body></html>"#
    )
}

pub async fn serve_page(server: &MockServer, page_path: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

pub async fn serve_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}
