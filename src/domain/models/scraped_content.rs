// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 内容大小的硬上限 (100MB)
pub const MAX_CONTENT_SIZE_BYTES: usize = 100 * 1024 * 1024;

/// 页面内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Article,
    ProductPage,
    Documentation,
    BlogPost,
    NewsArticle,
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::ProductPage => "product_page",
            ContentType::Documentation => "documentation",
            ContentType::BlogPost => "blog_post",
            ContentType::NewsArticle => "news_article",
            ContentType::General => "general",
        }
    }
}

/// 内容提取所用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// main/article/内容容器或段落
    Structural,
    JsonLd,
    OpenGraph,
    GenericText,
    MinimalFallback,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Structural => "structural",
            ExtractionMethod::JsonLd => "json_ld",
            ExtractionMethod::OpenGraph => "open_graph",
            ExtractionMethod::GenericText => "generic_text",
            ExtractionMethod::MinimalFallback => "minimal_fallback",
        }
    }
}

/// 页面中的图片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Internal,
    External,
}

/// 页面中的链接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub url: String,
    pub text: String,
    pub kind: LinkKind,
}

/// 单个页面的提取结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub url: String,
    pub title: Option<String>,
    /// 清洗后的正文，去除首尾空白后非空
    pub content: String,
    pub content_type: ContentType,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub images: Vec<ImageRef>,
    pub links: Vec<LinkRef>,
    pub timestamp: DateTime<Utc>,
    pub processing_time: Duration,
    /// 正文的UTF-8字节数
    pub content_size_bytes: usize,
    pub relevance_score: Option<f64>,
    pub content_quality_score: Option<f64>,
    pub extraction_method: ExtractionMethod,
    pub fallback_used: bool,
}

impl ScrapedContent {
    pub fn quality(&self) -> f64 {
        self.content_quality_score.unwrap_or(0.5)
    }

    pub fn relevance(&self) -> f64 {
        self.relevance_score.unwrap_or(0.5)
    }
}
