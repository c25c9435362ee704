// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::settings::DiscoverySettings;
use crate::domain::models::discovery::{DiscoveryMethod, DiscoveryResult};
use crate::domain::models::query::{QueryCategory, ScrapeQuery};
use crate::domain::services::llm_service::TextGenerator;
use crate::utils::url_utils::domain_key;

/// 便于抓取的测试站点，追加到多数分类之后
const SCRAPER_FRIENDLY: &[&str] = &[
    "httpbin.org",
    "example.com",
    "httpstat.us",
    "jsonplaceholder.typicode.com",
];

const AI_TOOLS: &[&str] = &[
    "producthunt.com",
    "github.com",
    "alternativeto.net",
    "saashub.com",
    "g2.com",
    "capterra.com",
    "techcrunch.com",
    "venturebeat.com",
];

const MUTUAL_FUNDS: &[&str] = &[
    "morningstar.com",
    "vanguard.com",
    "investor.vanguard.com",
    "fidelity.com",
    "schwab.com",
    "tdameritrade.com",
    "etrade.com",
    "yahoo.com/finance",
    "marketwatch.com",
    "investopedia.com",
    "nerdwallet.com",
    "bankrate.com",
    "thebalance.com",
    "forbes.com/investing",
    "bloomberg.com",
    "reuters.com/finance",
];

const GENERAL: &[&str] = &[
    "wikipedia.org",
    "reddit.com",
    "stackoverflow.com",
    "quora.com",
    "medium.com",
    "dev.to",
    "hashnode.dev",
    "substack.com",
];

const DOCUMENTATION: &[&str] = &["docs.python.org", "developer.mozilla.org", "www.w3.org"];

const TUTORIAL: &[&str] = &["www.w3schools.com", "www.tutorialspoint.com"];

/// 权威站点白名单
const AUTHORITATIVE: &[&str] = &[
    "github.com",
    "producthunt.com",
    "stackoverflow.com",
    "wikipedia.org",
    "morningstar.com",
    "vanguard.com",
    "fidelity.com",
];

/// LLM 响应中常见的包装键
const WRAPPER_KEYS: &[&str] = &["sites", "results", "data", "websites"];

/// 规则发现结果的固定置信度
const RULE_CONFIDENCE: f64 = 0.7;

static ARRAY_SCAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*\{[^\[\]]*\}\s*\]").expect("Failed to compile JSON array regex")
});

static OBJECT_SCAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{[^{}]*"url"\s*:\s*"[^"]+"[^{}]*\}"#)
        .expect("Failed to compile JSON object regex")
});

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?").expect("Failed to compile code fence regex"));

/// 站点发现接口
#[async_trait]
pub trait SiteDiscovery: Send + Sync {
    async fn discover(&self, query: &ScrapeQuery) -> Result<Vec<DiscoveryResult>>;
}

/// LLM 建议的站点
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedSite {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub relevance_score: f64,
    pub category: Option<String>,
}

/// 站点发现代理
///
/// 合并 LLM 生成、规则表与（预留的）搜索引擎三种策略，
/// 按域名去重、排序、过滤并截断到配置的最大数量
pub struct SiteDiscoveryAgent {
    llm: Option<Arc<dyn TextGenerator>>,
    settings: DiscoverySettings,
    domain_table: HashMap<String, Vec<String>>,
    trusted_domains: HashSet<String>,
}

#[async_trait]
impl SiteDiscovery for SiteDiscoveryAgent {
    async fn discover(&self, query: &ScrapeQuery) -> Result<Vec<DiscoveryResult>> {
        self.execute(query).await
    }
}

impl SiteDiscoveryAgent {
    pub fn new(llm: Option<Arc<dyn TextGenerator>>, settings: DiscoverySettings) -> Self {
        let mut domain_table = default_domain_table();
        for (key, entries) in &settings.domain_patterns {
            let target = domain_table.entry(table_key(key)).or_default();
            for entry in entries {
                if !target.contains(entry) {
                    target.push(entry.clone());
                }
            }
        }

        let trusted_domains = settings
            .trusted_domains
            .iter()
            .map(|d| d.trim().to_lowercase())
            .collect();

        Self {
            llm,
            settings,
            domain_table,
            trusted_domains,
        }
    }

    /// 替换内置的分类→域名表，键按分类别名归一化
    pub fn with_domain_table(mut self, table: HashMap<String, Vec<String>>) -> Self {
        let mut normalized: HashMap<String, Vec<String>> = HashMap::new();
        for (key, entries) in table {
            normalized.entry(table_key(&key)).or_default().extend(entries);
        }
        self.domain_table = normalized;
        self
    }

    /// 执行站点发现
    ///
    /// 单个策略失败只记录日志；返回的结果按相关度降序排列
    pub async fn execute(&self, query: &ScrapeQuery) -> Result<Vec<DiscoveryResult>> {
        info!(
            "Discovering sites for query '{}' (category: {})",
            query.text, query.category
        );
        let mut candidates = Vec::new();

        if self.settings.enable_llm {
            match self.discover_via_llm(query).await {
                Ok(sites) => {
                    info!("LLM discovery produced {} sites", sites.len());
                    candidates.extend(sites);
                }
                Err(e) => warn!("LLM discovery failed, continuing without it: {:#}", e),
            }
        }

        if self.settings.enable_rules {
            let sites = self.discover_via_rules(query);
            info!("Rule-based discovery produced {} sites", sites.len());
            candidates.extend(sites);
        }

        if self.settings.enable_search {
            match self.discover_via_search(query).await {
                Ok(sites) => candidates.extend(sites),
                Err(e) => warn!("Search discovery failed: {:#}", e),
            }
        }

        let ranked = self.rank(query, candidates);
        info!("Discovery finished with {} sites", ranked.len());
        Ok(ranked)
    }

    /// 通过文本生成能力发现站点
    ///
    /// 能力缺失或不可用时返回空列表
    pub async fn discover_via_llm(&self, query: &ScrapeQuery) -> Result<Vec<DiscoveryResult>> {
        let Some(llm) = self.llm.as_ref().filter(|llm| llm.is_available()) else {
            debug!("Text generation unavailable, skipping LLM discovery");
            return Ok(Vec::new());
        };

        let prompt = build_discovery_prompt(query);
        let response = llm
            .generate(
                &prompt,
                self.settings.llm_temperature,
                self.settings.llm_max_tokens,
            )
            .await
            .context("LLM site generation failed")?;

        let sites = parse_llm_response(&response);
        if sites.is_empty() {
            warn!("LLM response contained no usable sites");
        }

        Ok(sites
            .into_iter()
            .filter_map(|site| {
                DiscoveryResult::new(
                    site.url,
                    site.relevance_score,
                    DiscoveryMethod::LlmGenerated,
                    site.relevance_score,
                )
                .map(|result| {
                    result
                        .with_title(site.title)
                        .with_description(site.description)
                        .with_category(site.category)
                })
            })
            .collect())
    }

    /// 基于分类→域名表发现站点
    pub fn discover_via_rules(&self, query: &ScrapeQuery) -> Vec<DiscoveryResult> {
        let category = query.category.as_str();
        let Some(entries) = self.domain_table.get(category) else {
            debug!("No rule table for category {}", category);
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let url = entry_url(entry);
                let relevance = self.domain_relevance(entry, category);
                DiscoveryResult::new(url, relevance, DiscoveryMethod::RuleBased, RULE_CONFIDENCE)
                    .map(|result| {
                        result
                            .with_title(Some(entry.clone()))
                            .with_description(Some(format!(
                                "Known source for {}",
                                query.category.description()
                            )))
                            .with_category(Some(category.to_string()))
                    })
            })
            .collect()
    }

    /// 搜索引擎策略（预留）
    pub async fn discover_via_search(&self, query: &ScrapeQuery) -> Result<Vec<DiscoveryResult>> {
        debug!("Search engine discovery not configured for '{}'", query.text);
        Ok(Vec::new())
    }

    /// 规则表条目的相关度
    ///
    /// 基础 0.5；可信域名 +0.2；属于该分类 +0.2；权威站点 +0.1
    pub fn domain_relevance(&self, entry: &str, category: &str) -> f64 {
        let host = domain_key(&entry_url(entry)).unwrap_or_else(|| entry.to_lowercase());
        let mut score: f64 = 0.5;

        if self.trusted_domains.contains(&host) || self.trusted_domains.contains(entry) {
            score += 0.2;
        }
        if self
            .domain_table
            .get(category)
            .is_some_and(|entries| entries.iter().any(|e| e == entry))
        {
            score += 0.2;
        }
        if AUTHORITATIVE.contains(&host.trim_start_matches("www.")) {
            score += 0.1;
        }

        score.clamp(0.0, 1.0)
    }

    fn rank(&self, query: &ScrapeQuery, candidates: Vec<DiscoveryResult>) -> Vec<DiscoveryResult> {
        let mut sites = dedupe_by_domain(candidates);
        sort_by_relevance(&mut sites);

        let mut sites: Vec<DiscoveryResult> = sites
            .iter()
            .map(|site| {
                let mut score = site.relevance_score;
                if matches_category(site, query.category) {
                    score += 0.1;
                }
                score += site.confidence * 0.05;
                site.with_relevance(score.min(1.0))
            })
            .collect();
        sort_by_relevance(&mut sites);

        sites.retain(|site| site.relevance_score >= self.settings.min_relevance);
        sites.truncate(self.settings.max_results);
        sites
    }
}

/// 规则表的键：已知分类及其别名归一化为 `QueryCategory::as_str`
///
/// 无法识别的键按小写保留并告警，它们不会被任何查询分类命中
fn table_key(key: &str) -> String {
    let normalized = key.trim().to_lowercase();
    match key.parse::<QueryCategory>().unwrap_or(QueryCategory::Unknown) {
        QueryCategory::Unknown => {
            if normalized != QueryCategory::Unknown.as_str() {
                warn!("Domain patterns key '{}' matches no query category", key);
            }
            normalized
        }
        category => category.as_str().to_string(),
    }
}

fn default_domain_table() -> HashMap<String, Vec<String>> {
    let owned = |entries: &[&str]| entries.iter().map(|e| e.to_string()).collect::<Vec<_>>();
    let with_friendly = |entries: &[&str]| {
        let mut all = owned(entries);
        all.extend(owned(SCRAPER_FRIENDLY));
        all
    };
    let friendly_first = |entries: &[&str]| {
        let mut all = owned(SCRAPER_FRIENDLY);
        all.extend(owned(entries));
        all
    };

    HashMap::from([
        (QueryCategory::AiTools.as_str().to_string(), with_friendly(AI_TOOLS)),
        (QueryCategory::MutualFunds.as_str().to_string(), owned(MUTUAL_FUNDS)),
        (QueryCategory::General.as_str().to_string(), with_friendly(GENERAL)),
        (
            QueryCategory::Documentation.as_str().to_string(),
            friendly_first(DOCUMENTATION),
        ),
        (QueryCategory::Tutorial.as_str().to_string(), friendly_first(TUTORIAL)),
    ])
}

// full URLs are used verbatim, bare hosts and host/path entries get https
fn entry_url(entry: &str) -> String {
    if entry.contains("://") {
        entry.to_string()
    } else {
        format!("https://{}", entry)
    }
}

fn matches_category(site: &DiscoveryResult, category: QueryCategory) -> bool {
    if category == QueryCategory::Unknown {
        return false;
    }
    site.category
        .as_deref()
        .and_then(|c| c.parse::<QueryCategory>().ok())
        .is_some_and(|c| c == category)
}

/// 按域名去重，保留相关度更高者
fn dedupe_by_domain(sites: Vec<DiscoveryResult>) -> Vec<DiscoveryResult> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<DiscoveryResult> = Vec::new();

    for site in sites {
        match index.get(&site.domain) {
            Some(&i) => {
                if site.relevance_score > kept[i].relevance_score {
                    kept[i] = site;
                }
            }
            None => {
                index.insert(site.domain.clone(), kept.len());
                kept.push(site);
            }
        }
    }
    kept
}

fn sort_by_relevance(sites: &mut [DiscoveryResult]) {
    sites.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
}

/// 构建带分类倾向的站点发现提示词
pub fn build_discovery_prompt(query: &ScrapeQuery) -> String {
    let instructions = match query.category {
        QueryCategory::MutualFunds => {
            "Prioritize financial services companies, fund research platforms, financial news \
             sites and brokerages (for example morningstar.com, vanguard.com, fidelity.com). \
             Do NOT include general knowledge sites such as wikipedia.org, and do NOT include \
             test APIs or placeholder services."
        }
        QueryCategory::AiTools => {
            "Prioritize AI product directories, technology news sites, GitHub repositories \
             and AI platforms that list or review tools."
        }
        _ => "Prioritize authoritative, well-maintained sources with substantial text content.",
    };

    format!(
        r#"Find websites that contain useful, scrapable content for the following query.

Query: "{query}"
Category: {description}

{instructions}

Return between 5 and 10 websites as a JSON array. Each item must contain:
- "url": the full URL starting with https://
- "title": the site name
- "description": one sentence explaining why the site is relevant
- "relevance_score": a number between 0.0 and 1.0
- "category": "{category}"

Respond with the JSON array only."#,
        query = query.text,
        description = query.category.description(),
        instructions = instructions,
        category = query.category.as_str(),
    )
}

/// 解析 LLM 的站点建议
///
/// 依次尝试：方括号数组、包装对象、正则扫描数组、逐个扫描对象、
/// 去掉 markdown 代码块与说明文字后重新解析。全部失败时返回空列表。
pub fn parse_llm_response(response: &str) -> Vec<SuggestedSite> {
    let strategies: [(&str, fn(&str) -> Option<Vec<Value>>); 5] = [
        ("bracket_array", bracket_array),
        ("object_wrapper", object_wrapper),
        ("array_scan", array_scan),
        ("object_scan", object_scan),
        ("stripped_reparse", stripped_reparse),
    ];

    for (name, strategy) in strategies {
        let Some(items) = strategy(response) else {
            continue;
        };
        let sites: Vec<SuggestedSite> = items.iter().filter_map(suggested_site).collect();
        if !sites.is_empty() {
            debug!("Parsed {} sites from LLM response via {}", sites.len(), name);
            return sites;
        }
    }

    debug!("Could not parse LLM response: {:.200}", response);
    Vec::new()
}

fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn bracket_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str(span(text, '[', ']')?).ok()? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn unwrap_value(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Some(items);
                }
            }
            map.contains_key("url").then(|| vec![Value::Object(map)])
        }
        _ => None,
    }
}

fn object_wrapper(text: &str) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_str(span(text, '{', '}')?).ok()?;
    unwrap_value(value)
}

fn array_scan(text: &str) -> Option<Vec<Value>> {
    ARRAY_SCAN.find_iter(text).find_map(|m| {
        match serde_json::from_str::<Value>(m.as_str()).ok()? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    })
}

fn object_scan(text: &str) -> Option<Vec<Value>> {
    let items: Vec<Value> = OBJECT_SCAN
        .find_iter(text)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .filter(|v| v.get("url").is_some())
        .collect();
    (!items.is_empty()).then_some(items)
}

fn stripped_reparse(text: &str) -> Option<Vec<Value>> {
    let stripped = CODE_FENCE.replace_all(text, "");
    let mut candidate = stripped.trim();
    if let Some(start) = candidate.find('[') {
        candidate = &candidate[start..];
    }
    if let Some(end) = candidate.rfind(']') {
        candidate = &candidate[..=end];
    }
    unwrap_value(serde_json::from_str(candidate).ok()?)
}

fn suggested_site(value: &Value) -> Option<SuggestedSite> {
    let url = value.get("url")?.as_str()?.trim();
    if url.is_empty() {
        return None;
    }

    let text_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(SuggestedSite {
        url: url.to_string(),
        title: text_field("title"),
        description: text_field("description"),
        relevance_score: coerce_score(value.get("relevance_score")),
        category: text_field("category"),
    })
}

fn coerce_score(value: Option<&Value>) -> f64 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 1.0),
        _ => 0.5,
    }
}

#[cfg(test)]
#[path = "discovery_service_test.rs"]
mod tests;
