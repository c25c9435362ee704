// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::counter;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::settings::ExtractionSettings;
use crate::domain::models::scraped_content::{
    ContentType, ExtractionMethod, ImageRef, LinkKind, LinkRef, ScrapedContent,
    MAX_CONTENT_SIZE_BYTES,
};
use crate::engines::traits::PageFetcher;
use crate::utils::errors::{FetchError, ScrapingError};
use crate::utils::text_processing::{
    collapse_whitespace, normalize_whitespace, remove_ad_phrases, remove_duplicate_lines,
    truncate_to_byte_limit,
};
use crate::utils::url_utils::{domain_key, resolve_url};

/// 主内容容器选择器，按优先级排列
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".main-content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
];

/// 结构化提取时整体跳过的元素
const STRUCTURAL_SKIP: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside",
];

const OPEN_GRAPH_TAGS: &[&str] = &[
    "og:description",
    "og:title",
    "og:article:content",
    "og:article:section",
    "og:site_name",
];

const TWITTER_TAGS: &[&str] = &["twitter:description", "twitter:title", "twitter:card"];

const JSON_LD_FIELDS: &[&str] = &["description", "articleBody", "text", "content"];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4",
    "h5", "h6", "tr", "table", "blockquote", "pre", "figure", "figcaption", "dd", "dt", "hr",
];

/// 内容提取接口
#[async_trait]
pub trait ContentExtraction: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ScrapedContent, FetchError>;
}

/// 内容提取代理
///
/// 抓取单个URL，并通过策略级联把HTML归约为 `ScrapedContent`：
/// 结构化容器 → JSON-LD → Open Graph/Twitter → 通用文本 → 固定占位文本
pub struct ContentExtractorAgent {
    fetcher: Arc<dyn PageFetcher>,
    settings: ExtractionSettings,
    /// 原始HTML大小上限（字节）
    content_size_limit: usize,
}

#[async_trait]
impl ContentExtraction for ContentExtractorAgent {
    async fn extract(&self, url: &str) -> Result<ScrapedContent, FetchError> {
        self.execute(url).await
    }
}

/// 页面元数据
#[derive(Debug, Default)]
struct PageMetadata {
    title: Option<String>,
    description: Option<String>,
    keywords: Vec<String>,
    author: Option<String>,
    publish_date: Option<DateTime<Utc>>,
}

impl ContentExtractorAgent {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        settings: ExtractionSettings,
        content_size_limit: usize,
    ) -> Self {
        Self {
            fetcher,
            settings,
            content_size_limit,
        }
    }

    /// 抓取并提取单个页面
    ///
    /// 网络、robots、限流错误原样向上传播；HTML超过大小上限时返回 `CONTENT_TOO_LARGE`
    pub async fn execute(&self, url: &str) -> Result<ScrapedContent, FetchError> {
        let started = Instant::now();
        let page = self.fetcher.fetch(url).await?;

        let size = page.body.len();
        if size > self.content_size_limit {
            return Err(
                ScrapingError::content_too_large(&page.url, size, self.content_size_limit).into(),
            );
        }

        let mut content = self.extract_from_html(&page.url, &page.body);
        content.processing_time = started.elapsed();

        info!(
            "Content extraction for {} completed in {:.2}s via {} ({} bytes)",
            content.url,
            content.processing_time.as_secs_f64(),
            content.extraction_method.as_str(),
            content.content_size_bytes
        );
        Ok(content)
    }

    /// 从已抓取的HTML中提取内容
    ///
    /// 纯函数，不做任何网络请求
    pub fn extract_from_html(&self, url: &str, html: &str) -> ScrapedContent {
        let document = Html::parse_document(html);

        let (content, extraction_method) = self.run_cascade(&document, url);
        let fallback_used = extraction_method != ExtractionMethod::Structural;
        counter!("siftrs_extraction_total", "method" => extraction_method.as_str()).increment(1);

        let metadata = extract_metadata(&document);
        let content_type = classify_content(&document);
        let images = if self.settings.include_images {
            extract_images(&document, url)
        } else {
            Vec::new()
        };
        let links = if self.settings.include_links {
            extract_links(&document, url)
        } else {
            Vec::new()
        };

        let quality = content_quality(&content, &metadata);
        let content_size_bytes = content.len();

        ScrapedContent {
            url: url.to_string(),
            title: metadata.title,
            content,
            content_type,
            author: metadata.author,
            publish_date: metadata.publish_date,
            description: metadata.description,
            keywords: metadata.keywords,
            images,
            links,
            timestamp: Utc::now(),
            processing_time: Duration::ZERO,
            content_size_bytes,
            relevance_score: None,
            content_quality_score: Some(quality),
            extraction_method,
            fallback_used,
        }
    }

    fn run_cascade(&self, document: &Html, url: &str) -> (String, ExtractionMethod) {
        let strategies: [(ExtractionMethod, bool); 4] = [
            (ExtractionMethod::Structural, true),
            (ExtractionMethod::JsonLd, self.settings.enable_json_ld),
            (ExtractionMethod::OpenGraph, self.settings.enable_open_graph),
            (ExtractionMethod::GenericText, self.settings.enable_generic),
        ];

        for (method, enabled) in strategies {
            if !enabled {
                continue;
            }
            let candidate = match method {
                ExtractionMethod::Structural => self.extract_structural(document),
                ExtractionMethod::JsonLd => self.extract_json_ld(document),
                ExtractionMethod::OpenGraph => self.extract_meta_tags(document),
                _ => self.extract_generic_text(document),
            };
            match candidate {
                Some(text) if self.long_enough(&text) => return (text, method),
                _ => debug!("Strategy {} yielded nothing for {}", method.as_str(), url),
            }
        }

        (
            format!("No content could be extracted from {}", url),
            ExtractionMethod::MinimalFallback,
        )
    }

    fn long_enough(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.settings.min_content_length
    }

    fn extract_structural(&self, document: &Html) -> Option<String> {
        let mut parts = Vec::new();

        if self.settings.prefer_main_content {
            for css in MAIN_SELECTORS {
                let Some(selector) = selector(css) else {
                    continue;
                };
                for element in document.select(&selector) {
                    let text = element_text(element, STRUCTURAL_SKIP);
                    if self.long_enough(&text) {
                        parts.push(text);
                    }
                }
                // first container type that yields content wins
                if !parts.is_empty() {
                    break;
                }
            }
        }

        if parts.is_empty() {
            let paragraphs: Vec<String> = selector("p")
                .map(|p| {
                    document
                        .select(&p)
                        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                        .filter(|t| t.chars().count() > 50)
                        .collect()
                })
                .unwrap_or_default();
            if !paragraphs.is_empty() {
                parts.push(paragraphs.join("\n\n"));
            }
        }

        if parts.is_empty() {
            return None;
        }
        Some(self.clean_content(&parts.join("\n\n")))
    }

    fn extract_json_ld(&self, document: &Html) -> Option<String> {
        for data in json_ld_blocks(document) {
            for object in json_ld_objects(&data) {
                for field in JSON_LD_FIELDS {
                    if let Some(text) = object.get(*field).and_then(Value::as_str) {
                        if self.long_enough(text) {
                            return Some(self.clean_content(text));
                        }
                    }
                }
            }
        }
        None
    }

    fn extract_meta_tags(&self, document: &Html) -> Option<String> {
        OPEN_GRAPH_TAGS
            .iter()
            .chain(TWITTER_TAGS.iter())
            .filter_map(|tag| meta_content(document, tag))
            .find(|text| self.long_enough(text))
            .map(|text| self.clean_content(&text))
    }

    fn extract_generic_text(&self, document: &Html) -> Option<String> {
        let mut buffer = String::new();
        collect_generic_text(document.root_element(), &mut buffer);
        let text = collapse_whitespace(&buffer);
        if self.long_enough(&text) {
            Some(self.clean_content(&text))
        } else {
            None
        }
    }

    /// 清洗正文：去广告用语、规范空白、去重复行，最后按字节上限截断
    fn clean_content(&self, content: &str) -> String {
        let mut content = if self.settings.remove_ads {
            remove_ad_phrases(content)
        } else {
            content.to_string()
        };
        if self.settings.normalize_whitespace {
            content = normalize_whitespace(&content);
        }
        if self.settings.remove_duplicate_lines {
            content = remove_duplicate_lines(&content);
        }
        let limit = self.settings.max_content_length.min(MAX_CONTENT_SIZE_BYTES);
        truncate_to_byte_limit(content.trim(), limit)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

/// 提取元素文本：块级元素之间换行，跳过 `skip` 中的元素
fn element_text(element: ElementRef<'_>, skip: &[&str]) -> String {
    let mut buffer = String::new();
    walk_text(element, skip, &mut buffer);
    buffer
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk_text(element: ElementRef<'_>, skip: &[&str], buffer: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buffer.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if skip.contains(&name) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = is_block(name);
                if block {
                    buffer.push('\n');
                }
                walk_text(child_ref, skip, buffer);
                if block {
                    buffer.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// 通用文本：去掉 script/style，只在导航类元素文本较短时才丢弃
fn collect_generic_text(element: ElementRef<'_>, buffer: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                buffer.push_str(text);
                buffer.push(' ');
            }
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                match el.name() {
                    "script" | "style" | "noscript" | "head" => continue,
                    "nav" | "header" | "footer" | "aside" => {
                        let own = collapse_whitespace(&child_ref.text().collect::<String>());
                        if own.chars().count() < 100 {
                            continue;
                        }
                    }
                    _ => {}
                }
                collect_generic_text(child_ref, buffer);
            }
            _ => {}
        }
    }
}

fn meta_content(document: &Html, key: &str) -> Option<String> {
    let css = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
    let selector = selector(&css)?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

fn json_ld_blocks(document: &Html) -> Vec<Value> {
    let Some(selector) = selector(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// 展开 JSON-LD 中的对象（支持数组与 `@graph`）
fn json_ld_objects(value: &Value) -> Vec<&serde_json::Map<String, Value>> {
    let mut objects = Vec::new();
    match value {
        Value::Object(map) => {
            objects.push(map);
            if let Some(graph) = map.get("@graph") {
                objects.extend(json_ld_objects(graph));
            }
        }
        Value::Array(items) => {
            for item in items {
                objects.extend(json_ld_objects(item));
            }
        }
        _ => {}
    }
    objects
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn extract_metadata(document: &Html) -> PageMetadata {
    let title = first_text(document, "title").or_else(|| meta_content(document, "og:title"));
    let description = meta_content(document, "description")
        .or_else(|| meta_content(document, "og:description"));
    let keywords = meta_content(document, "keywords")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let author =
        meta_content(document, "author").or_else(|| meta_content(document, "article:author"));

    PageMetadata {
        title,
        description,
        keywords,
        author,
        publish_date: extract_publish_date(document),
    }
}

fn exists(document: &Html, css: &str) -> bool {
    selector(css).is_some_and(|s| document.select(&s).next().is_some())
}

/// 基于页面结构判断内容类型
fn classify_content(document: &Html) -> ContentType {
    let is_product = exists(document, r#"meta[property="product:price:amount"]"#)
        || meta_content(document, "og:type").is_some_and(|t| t.eq_ignore_ascii_case("product"));
    if is_product {
        return ContentType::ProductPage;
    }

    let has_time = exists(document, "time");
    if has_time && exists(document, "div.post") {
        return ContentType::BlogPost;
    }
    if has_time && exists(document, "div.news") {
        return ContentType::NewsArticle;
    }
    if has_time || exists(document, "article") {
        return ContentType::Article;
    }
    if exists(document, "nav.sidebar") || exists(document, "div.toc") {
        return ContentType::Documentation;
    }
    ContentType::General
}

/// 依次尝试 meta、`<time>`、JSON-LD `datePublished`
fn extract_publish_date(document: &Html) -> Option<DateTime<Utc>> {
    let from_meta = meta_content(document, "article:published_time").and_then(|d| parse_date(&d));
    if from_meta.is_some() {
        return from_meta;
    }

    if let Some(selector) = selector("time[datetime]") {
        let from_time = document
            .select(&selector)
            .filter_map(|el| el.value().attr("datetime"))
            .find_map(parse_date);
        if from_time.is_some() {
            return from_time;
        }
    }

    json_ld_blocks(document).iter().find_map(|block| {
        json_ld_objects(block)
            .into_iter()
            .filter_map(|obj| obj.get("datePublished").and_then(Value::as_str))
            .find_map(parse_date)
    })
}

pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn extract_images(document: &Html, base_url: &str) -> Vec<ImageRef> {
    let Some(selector) = selector("img[src]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() {
                return None;
            }
            Some(ImageRef {
                url: resolve_url(base_url, src)?,
                alt: img.value().attr("alt").unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

fn extract_links(document: &Html, base_url: &str) -> Vec<LinkRef> {
    let Some(selector) = selector("a[href]") else {
        return Vec::new();
    };
    let base_domain = domain_key(base_url);
    document
        .select(&selector)
        .filter_map(|a| {
            let text = collapse_whitespace(&a.text().collect::<String>());
            let href = a.value().attr("href")?;
            if text.is_empty() {
                return None;
            }
            let url = resolve_url(base_url, href)?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return None;
            }
            let kind = if domain_key(&url) == base_domain {
                LinkKind::Internal
            } else {
                LinkKind::External
            };
            Some(LinkRef { url, text, kind })
        })
        .collect()
}

/// 内容质量分
fn content_quality(content: &str, metadata: &PageMetadata) -> f64 {
    let mut score = 0.5;

    let length = content.chars().count();
    if length > 1000 {
        score += 0.2;
    } else if length > 500 {
        score += 0.1;
    }

    for present in [
        metadata.title.is_some(),
        metadata.description.is_some(),
        metadata.author.is_some(),
        metadata.publish_date.is_some(),
    ] {
        if present {
            score += 0.1;
        }
    }

    if content.contains("\n\n") {
        score += 0.1;
    }

    f64::clamp(score, 0.0, 1.0)
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
