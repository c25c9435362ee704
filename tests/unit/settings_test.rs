// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, File, FileFormat};
use siftrs::config::settings::Settings;
use std::time::Duration;

#[test]
fn test_default_config_file_loads() {
    let settings = Settings::new().expect("config/default.toml should load");

    assert_eq!(settings.scraper.concurrency, 5);
    assert_eq!(settings.scraper.request_timeout(), Duration::from_secs(20));
    assert_eq!(settings.scraper.retry_backoff_ms, 1000);
    assert_eq!(settings.rate_limiter.default_delay(), Duration::from_secs(1));
    assert_eq!(settings.robots.fetch_timeout_secs, 10);
    assert!(settings.discovery.domain_patterns.is_empty());
    assert_eq!(settings.llm.model, "gpt-4o-mini");
}

#[test]
fn test_partial_sections_fall_back_to_defaults() {
    let toml = r#"
[scraper]
concurrency = 2

[discovery]
trusted_domains = ["vanguard.com"]

[discovery.domain_patterns]
mutual_funds = ["fundsite.example", "https://research.example/funds"]

[extraction]
include_images = false
"#;

    let settings: Settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    assert_eq!(settings.scraper.concurrency, 2);
    assert_eq!(settings.scraper.max_retries, 3);
    assert_eq!(settings.discovery.trusted_domains, vec!["vanguard.com"]);
    assert_eq!(settings.discovery.domain_patterns["mutual_funds"].len(), 2);
    assert!(!settings.extraction.include_images);
    assert!(settings.extraction.include_links);
    assert_eq!(settings.extraction.min_content_length, 100);
}
