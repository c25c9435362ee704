// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::models::discovery::{DiscoveryMethod, DiscoveryResult};
use crate::domain::models::query::{QueryCategory, ScrapeQuery};
use crate::domain::models::scraped_content::{ContentType, ScrapedContent};
use crate::utils::url_utils::domain_key;

/// 捐赠页、占位页与测试API的特征
const NOISE_SIGNALS: &[&str] = &[
    "donate",
    "donation",
    "lorem ipsum",
    "placeholder",
    "httpbin",
    "jsonplaceholder",
    "httpstat.us",
    "example domain",
    "test api",
];

const FINANCE_SIGNALS: &[&str] = &[
    "fund",
    "invest",
    "portfolio",
    "etf",
    "expense ratio",
    "nav",
    "stock",
    "bond",
    "financ",
    "brokerage",
    "dividend",
];

const AI_SIGNALS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "ml",
    "llm",
    "gpt",
    "neural",
    "automation",
    "model",
];

const DOCUMENTATION_SIGNALS: &[&str] = &[
    "documentation",
    "docs",
    "api reference",
    "reference",
    "manual",
];

const TUTORIAL_SIGNALS: &[&str] = &["tutorial", "learn", "lesson", "how to", "guide", "course"];

/// 结果后处理评分器
///
/// 负责增强质量分、无关内容过滤和综合排序分
pub struct RelevanceScorer {
    category: QueryCategory,
    query_terms: Vec<String>,
}

impl RelevanceScorer {
    pub fn new(query: &ScrapeQuery) -> Self {
        let query_terms = tokenize(&query.text)
            .into_iter()
            .filter(|term| term.len() > 3) // short words match too much
            .collect();

        Self {
            category: query.category,
            query_terms,
        }
    }

    /// 增强质量分
    ///
    /// 提取质量 + 发现相关度×0.2 + 分类匹配0.1 + 发现方式加成 + 内容长度加成，截断到 [0, 1]
    pub fn enhanced_quality_score(&self, content: &ScrapedContent, site: &DiscoveryResult) -> f64 {
        let mut score = content.quality();

        score += site.relevance_score * 0.2;

        let site_category = site
            .category
            .as_deref()
            .and_then(|c| c.parse::<QueryCategory>().ok());
        if self.category != QueryCategory::Unknown && site_category == Some(self.category) {
            score += 0.1;
        }

        score += match site.discovery_method {
            DiscoveryMethod::LlmGenerated => 0.05,
            DiscoveryMethod::RuleBased => 0.03,
            _ => 0.0,
        };

        if content.content_size_bytes > 5000 {
            score += 0.05;
        } else if content.content_size_bytes > 2000 {
            score += 0.03;
        }

        score.clamp(0.0, 1.0)
    }

    /// 判断内容是否为噪声（捐赠、占位、测试API），出现分类正向信号时保留
    pub fn is_irrelevant(&self, content: &ScrapedContent) -> bool {
        let haystack = token_text(&[
            content.url.as_str(),
            content.title.as_deref().unwrap_or_default(),
            content.description.as_deref().unwrap_or_default(),
            content.content.as_str(),
        ]);

        let noisy = NOISE_SIGNALS.iter().any(|s| contains_signal(&haystack, s));
        if !noisy {
            return false;
        }

        let positive = self.category_signals().iter().any(|s| contains_signal(&haystack, s))
            || self.query_terms.iter().any(|t| contains_signal(&haystack, t));
        !positive
    }

    /// 综合排序分：0.3×质量 + 0.4×相关度 + 0.2×类型 + 0.1×分类匹配
    pub fn combined_score(&self, content: &ScrapedContent) -> f64 {
        let type_relevance = match content.content_type {
            ContentType::Article => 0.8,
            ContentType::Documentation => 0.7,
            _ => 0.5,
        };
        // only "documentation" exists in both vocabularies
        let category_match = if content.content_type.as_str() == self.category.as_str() {
            0.9
        } else {
            0.5
        };

        0.3 * content.quality() + 0.4 * content.relevance() + 0.2 * type_relevance
            + 0.1 * category_match
    }

    /// 按综合分降序排列，分数相同时按URL排序
    pub fn rank_by_combined_score(&self, mut items: Vec<ScrapedContent>) -> Vec<ScrapedContent> {
        items.sort_by(|a, b| {
            self.combined_score(b)
                .partial_cmp(&self.combined_score(a))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.url.cmp(&b.url))
        });
        items
    }

    fn category_signals(&self) -> &'static [&'static str] {
        match self.category {
            QueryCategory::MutualFunds => FINANCE_SIGNALS,
            QueryCategory::AiTools => AI_SIGNALS,
            QueryCategory::Documentation => DOCUMENTATION_SIGNALS,
            QueryCategory::Tutorial => TUTORIAL_SIGNALS,
            QueryCategory::General | QueryCategory::Unknown => &[],
        }
    }
}

/// 按域名去重，保留质量分更高者，顺序为首次出现的顺序
pub fn dedupe_by_domain(items: Vec<ScrapedContent>) -> Vec<ScrapedContent> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<ScrapedContent> = Vec::with_capacity(items.len());

    for item in items {
        let key = domain_key(&item.url).unwrap_or_else(|| item.url.clone());
        match index.get(&key) {
            Some(&i) => {
                if item.quality() > kept[i].quality() {
                    kept[i] = item;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(item);
            }
        }
    }
    kept
}

/// 最终过滤：正文不少于500字节，质量分≥0.3，相关度≥0.2
pub fn passes_final_filter(content: &ScrapedContent) -> bool {
    content.content_size_bytes >= 500 && content.quality() >= 0.3 && content.relevance() >= 0.2
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// " tok1 tok2 ... " so that signals can be matched on token boundaries
fn token_text(parts: &[&str]) -> String {
    let mut text = String::from(" ");
    for part in parts {
        for token in tokenize(part) {
            text.push_str(&token);
            text.push(' ');
        }
    }
    text
}

fn contains_signal(haystack: &str, signal: &str) -> bool {
    let normalized = tokenize(signal).join(" ");
    if normalized.is_empty() {
        return false;
    }
    if normalized.len() <= 3 {
        haystack.contains(&format!(" {} ", normalized))
    } else {
        haystack.contains(&format!(" {}", normalized))
    }
}
