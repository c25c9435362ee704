// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use futures::FutureExt;
use metrics::counter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::settings::Settings;
use crate::domain::models::discovery::DiscoveryResult;
use crate::domain::models::query::ScrapeQuery;
use crate::domain::models::scraped_content::ScrapedContent;
use crate::domain::services::discovery_service::{SiteDiscovery, SiteDiscoveryAgent};
use crate::domain::services::extraction_service::{ContentExtraction, ContentExtractorAgent};
use crate::domain::services::llm_service::{LLMService, TextGenerator};
use crate::domain::services::rate_limiting_service::RateLimitManager;
use crate::domain::services::relevance_scorer::{
    dedupe_by_domain, passes_final_filter, RelevanceScorer,
};
use crate::engines::fetcher::{build_http_client, HttpFetcher};
use crate::utils::errors::FetchError;
use crate::utils::robots::RobotsChecker;

/// 每类错误保留的示例消息数量
const MAX_ERROR_EXAMPLES: usize = 3;

/// 编排阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Extracting,
    PostProcessing,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovering => "discovering",
            Phase::Extracting => "extracting",
            Phase::PostProcessing => "post_processing",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 同一类错误的汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorPattern {
    pub count: usize,
    pub sites: Vec<String>,
    pub examples: Vec<String>,
}

/// 抓取报告
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    /// 本次运行的ID，与日志中的 `run_id` 字段对应
    pub run_id: Uuid,
    pub query: ScrapeQuery,
    /// 过滤并排序后的结果
    pub results: Vec<ScrapedContent>,
    /// 按错误类别汇总的失败信息
    pub error_summary: BTreeMap<String, ErrorPattern>,
    pub discovered_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// 是否因截止时间提前结束
    pub timed_out: bool,
    pub processing_time: Duration,
}

impl ScrapeReport {
    fn empty(run_id: Uuid, query: ScrapeQuery, timed_out: bool, processing_time: Duration) -> Self {
        Self {
            run_id,
            query,
            results: Vec::new(),
            error_summary: BTreeMap::new(),
            discovered_count: 0,
            success_count: 0,
            failure_count: 0,
            timed_out,
            processing_time,
        }
    }
}

/// 编排器配置概览
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorInfo {
    pub concurrency: usize,
    pub respect_robots: bool,
    pub llm_discovery: bool,
    pub rule_discovery: bool,
    pub search_discovery: bool,
}

type TaskOutcome = (
    usize,
    DiscoveryResult,
    std::thread::Result<Result<ScrapedContent, FetchError>>,
);

#[derive(Default)]
struct ErrorCollector {
    patterns: BTreeMap<String, ErrorPattern>,
    failures: usize,
}

impl ErrorCollector {
    fn record(&mut self, kind: &str, site: &str, message: String) {
        self.failures += 1;
        counter!("siftrs_orchestrator_failures_total", "error_type" => kind.to_string())
            .increment(1);

        let pattern = self.patterns.entry(kind.to_string()).or_default();
        pattern.count += 1;
        pattern.sites.push(site.to_string());
        if pattern.examples.len() < MAX_ERROR_EXAMPLES {
            pattern.examples.push(message);
        }
    }
}

/// 抓取编排器
///
/// 对单个查询依次执行：站点发现 → 有界并发的内容提取 → 后处理（过滤、去重、排序）
///
/// 全局并发由信号量限制，同一域名的请求由域名限流器串行化。
/// 单个站点的失败只进入错误汇总，只有发现阶段的错误会向上传播。
pub struct ScraperOrchestrator {
    discovery: Arc<dyn SiteDiscovery>,
    extractor: Arc<dyn ContentExtraction>,
    semaphore: Arc<Semaphore>,
    info: OrchestratorInfo,
}

impl ScraperOrchestrator {
    pub fn new(
        discovery: Arc<dyn SiteDiscovery>,
        extractor: Arc<dyn ContentExtraction>,
        settings: &Settings,
    ) -> Self {
        let concurrency = settings.scraper.concurrency.max(1);
        Self {
            discovery,
            extractor,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            info: OrchestratorInfo {
                concurrency,
                respect_robots: settings.scraper.respect_robots,
                llm_discovery: settings.discovery.enable_llm,
                rule_discovery: settings.discovery.enable_rules,
                search_discovery: settings.discovery.enable_search,
            },
        }
    }

    /// 按配置装配完整的抓取链路
    ///
    /// 限流管理器由调用方持有，以便同时交给后台清理任务
    pub fn from_settings(settings: &Settings, rate_limits: Arc<RateLimitManager>) -> Result<Self> {
        let client = build_http_client(&settings.scraper).context("Failed to build HTTP client")?;
        let robots = Arc::new(RobotsChecker::new(
            client.clone(),
            &settings.scraper,
            &settings.robots,
            Some(rate_limits.clone()),
        ));
        let fetcher = Arc::new(HttpFetcher::new(
            client,
            robots,
            rate_limits,
            &settings.scraper,
        ));

        let llm_service = LLMService::new(&settings.llm)?;
        let llm: Option<Arc<dyn TextGenerator>> = if llm_service.is_available() {
            Some(Arc::new(llm_service))
        } else {
            warn!("LLM API key not configured, discovery will use rules only");
            None
        };

        let discovery = Arc::new(SiteDiscoveryAgent::new(llm, settings.discovery.clone()));
        let extractor = Arc::new(ContentExtractorAgent::new(
            fetcher,
            settings.extraction.clone(),
            settings.scraper.content_size_limit,
        ));

        Ok(Self::new(discovery, extractor, settings))
    }

    pub fn info(&self) -> OrchestratorInfo {
        self.info.clone()
    }

    /// 执行完整抓取流程
    ///
    /// # 错误
    /// * 仅当站点发现本身出错时返回错误；“未发现站点”返回空报告
    pub async fn execute(&self, query: ScrapeQuery) -> Result<ScrapeReport> {
        self.run(query, None).await
    }

    /// 带总截止时间的抓取
    ///
    /// 到期后取消仍在进行的提取任务，用已完成的结果生成报告并标记 `timed_out`
    pub async fn execute_with_deadline(
        &self,
        query: ScrapeQuery,
        deadline: Duration,
    ) -> Result<ScrapeReport> {
        self.run(query, Some(deadline)).await
    }

    /// 直接提取单个URL，不经过发现与后处理
    pub async fn scrape_single_url(&self, url: &str) -> Result<ScrapedContent, FetchError> {
        self.extractor.extract(url).await
    }

    async fn run(&self, query: ScrapeQuery, deadline: Option<Duration>) -> Result<ScrapeReport> {
        let started = Instant::now();
        let deadline_at = deadline.map(|d| started + d);
        let run_id = Uuid::new_v4();

        info!(%run_id, phase = %Phase::Discovering, "Starting scrape for '{}'", query.text);
        let discovery = self.discovery.discover(&query);
        let discovered = match deadline_at {
            Some(at) => tokio::time::timeout_at(at, discovery).await.ok(),
            None => Some(discovery.await),
        };
        let Some(discovered) = discovered else {
            warn!("Deadline expired during discovery for '{}'", query.text);
            return Ok(ScrapeReport::empty(run_id, query, true, started.elapsed()));
        };
        let discovered = discovered.context("Site discovery failed")?;

        if discovered.is_empty() {
            info!(phase = %Phase::Done, "No sites discovered for '{}'", query.text);
            return Ok(ScrapeReport::empty(run_id, query, false, started.elapsed()));
        }
        let discovered_count = discovered.len();

        info!(
            phase = %Phase::Extracting,
            "Extracting content from {} sites (concurrency {})",
            discovered_count,
            self.info.concurrency
        );
        let (outcomes, mut errors, timed_out) = self.extract_all(discovered, deadline_at).await;

        let scorer = RelevanceScorer::new(&query);
        let mut successes: Vec<(usize, ScrapedContent)> = Vec::new();
        for (index, site, outcome) in outcomes {
            match outcome {
                Ok(Ok(mut content)) => {
                    content.content_quality_score =
                        Some(scorer.enhanced_quality_score(&content, &site));
                    content.relevance_score = Some(site.relevance_score);
                    successes.push((index, content));
                }
                Ok(Err(e)) => {
                    warn!(url = %site.url, error_type = e.kind(), "Extraction failed: {}", e);
                    errors.record(e.kind(), &site.url, e.to_string());
                }
                Err(_) => {
                    error!(url = %site.url, "Extraction task panicked");
                    errors.record("task_failed", &site.url, "extraction task panicked".to_string());
                }
            }
        }
        // completion order is arbitrary
        successes.sort_by_key(|(index, _)| *index);
        let success_count = successes.len();

        info!(
            phase = %Phase::PostProcessing,
            "Post-processing {} successful extractions ({} failed)",
            success_count,
            errors.failures
        );
        let results = post_process(&scorer, successes.into_iter().map(|(_, c)| c).collect());

        for (kind, pattern) in &errors.patterns {
            info!(
                "Error pattern {}: {} occurrences, e.g. {:?}",
                kind, pattern.count, pattern.examples
            );
        }

        let report = ScrapeReport {
            run_id,
            query,
            results,
            error_summary: errors.patterns,
            discovered_count,
            success_count,
            failure_count: errors.failures,
            timed_out,
            processing_time: started.elapsed(),
        };
        info!(
            %run_id,
            phase = %Phase::Done,
            "Scrape finished with {} results in {:.2}s",
            report.results.len(),
            report.processing_time.as_secs_f64()
        );
        Ok(report)
    }

    async fn extract_all(
        &self,
        sites: Vec<DiscoveryResult>,
        deadline_at: Option<Instant>,
    ) -> (Vec<TaskOutcome>, ErrorCollector, bool) {
        let mut tasks = JoinSet::new();
        for (index, site) in sites.into_iter().enumerate() {
            let semaphore = self.semaphore.clone();
            let extractor = self.extractor.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = AssertUnwindSafe(extractor.extract(&site.url))
                    .catch_unwind()
                    .await;
                (index, site, outcome)
            });
        }

        let mut outcomes = Vec::new();
        let mut errors = ErrorCollector::default();
        let mut timed_out = false;

        loop {
            let next = match deadline_at {
                Some(at) => match tokio::time::timeout_at(at, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            "Deadline expired with {} extraction tasks outstanding",
                            tasks.len()
                        );
                        timed_out = true;
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            match next {
                Some(Ok(outcome)) => outcomes.push(outcome),
                Some(Err(e)) => {
                    error!("Extraction task failed: {}", e);
                    errors.record("task_failed", "unknown", e.to_string());
                }
                None => break,
            }
        }

        // tasks that completed just before the abort still count
        while let Some(joined) = tasks.join_next().await {
            if let Ok(outcome) = joined {
                outcomes.push(outcome);
            }
        }

        (outcomes, errors, timed_out)
    }
}

/// 后处理：无关内容过滤 → 按域名去重 → 综合排序 → 最终阈值过滤
fn post_process(scorer: &RelevanceScorer, items: Vec<ScrapedContent>) -> Vec<ScrapedContent> {
    let items: Vec<ScrapedContent> = items
        .into_iter()
        .filter(|content| {
            let irrelevant = scorer.is_irrelevant(content);
            if irrelevant {
                debug!("Dropping irrelevant content from {}", content.url);
            }
            !irrelevant
        })
        .collect();

    let items = dedupe_by_domain(items);
    let items = scorer.rank_by_combined_score(items);
    items.into_iter().filter(passes_final_filter).collect()
}

#[cfg(test)]
#[path = "scraper_orchestrator_test.rs"]
mod tests;
