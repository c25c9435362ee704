// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::config::settings::{RobotsSettings, ScraperSettings};
use crate::domain::services::rate_limiting_service::RateLimitManager;
use crate::utils::url_utils::origin_of;

/// Robots.txt检查器接口
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    /// 检查URL是否被允许访问
    async fn can_fetch(&self, url: &str, user_agent: &str) -> bool;
    /// 获取爬取延迟
    async fn get_crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration>;
}

/// Crawl-delay 上限，超过的值按上限处理
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(300);

/// 单个 User-agent 分组的规则
#[derive(Debug, Clone, Default)]
struct AgentRules {
    allow: Vec<String>,
    disallow: Vec<String>,
}

impl AgentRules {
    fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.disallow.is_empty()
    }
}

/// 解析后的 robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// 小写 user-agent -> 规则
    agents: HashMap<String, AgentRules>,
    /// 小写 user-agent -> Crawl-delay
    crawl_delays: HashMap<String, Duration>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// 解析 robots.txt 文本
    ///
    /// 指令名不区分大小写，`#` 之后为注释。连续的 User-agent 行共享同一分组。
    pub fn parse(content: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut last_was_agent = false;

        for raw_line in content.lines() {
            let line = match raw_line.find('#') {
                Some(idx) => &raw_line[..idx],
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !last_was_agent {
                        current_agents.clear();
                    }
                    let agent = value.to_lowercase();
                    rules.agents.entry(agent.clone()).or_default();
                    current_agents.push(agent);
                    last_was_agent = true;
                    continue;
                }
                "disallow" | "allow" => {
                    // empty value means "no restriction"
                    if !value.is_empty() {
                        for agent in &current_agents {
                            let entry = rules.agents.entry(agent.clone()).or_default();
                            if directive == "allow" {
                                entry.allow.push(value.to_string());
                            } else {
                                entry.disallow.push(value.to_string());
                            }
                        }
                    }
                }
                "crawl-delay" => match parse_crawl_delay(value) {
                    Some(delay) => {
                        if current_agents.is_empty() {
                            rules.crawl_delays.insert("*".to_string(), delay);
                        }
                        for agent in &current_agents {
                            rules.crawl_delays.insert(agent.clone(), delay);
                        }
                    }
                    None => warn!("Invalid crawl-delay value: {}", value),
                },
                "sitemap" if !value.is_empty() => rules.sitemaps.push(value.to_string()),
                _ => {}
            }
            last_was_agent = false;
        }

        rules
    }

    /// 选择适用的分组：先匹配具体 agent，再回退到 `*`
    fn candidate_keys(&self, user_agent: &str) -> Vec<String> {
        let ua = user_agent.trim().to_lowercase();
        let token = ua.split('/').next().unwrap_or("").trim().to_string();

        let mut keys = Vec::with_capacity(2);
        if let Some(key) = self
            .agents
            .keys()
            .find(|k| k.as_str() != "*" && (**k == ua || **k == token))
        {
            keys.push(key.clone());
        }
        keys.push("*".to_string());
        keys
    }

    /// 判断路径是否允许访问
    ///
    /// 分组内先检查 Allow，命中即放行；再检查 Disallow，命中即拒绝；否则放行。
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        for key in self.candidate_keys(user_agent) {
            let Some(group) = self.agents.get(&key) else {
                continue;
            };
            if group.is_empty() {
                continue;
            }
            if group.allow.iter().any(|p| path_matches(path, p)) {
                return true;
            }
            if group.disallow.iter().any(|p| path_matches(path, p)) {
                return false;
            }
            return true;
        }
        true
    }

    /// 适用于该 agent 的 Crawl-delay
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.candidate_keys(user_agent)
            .iter()
            .find_map(|key| self.crawl_delays.get(key))
            .copied()
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// 解析 Crawl-delay 秒数
///
/// 负数、非数字以及无法表示为 `Duration` 的值返回 `None`，过大的值截断到上限
fn parse_crawl_delay(value: &str) -> Option<Duration> {
    let secs = value.parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs)
        .ok()
        .map(|delay| delay.min(MAX_CRAWL_DELAY))
}

/// robots 路径匹配
///
/// `*` 匹配全部；以 `*` 结尾为前缀匹配；其余为完全相等或前缀匹配
fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }
    path == pattern || path.starts_with(pattern)
}

/// 缓存的Robots.txt内容
#[derive(Clone)]
struct CachedRobots {
    rules: Arc<RobotsRules>,
    fetched_at: Instant,
}

/// robots 缓存统计
#[derive(Debug, Clone, Serialize)]
pub struct RobotsCacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub cache_ttl: Duration,
}

/// Robots.txt检查器
///
/// 按源（scheme+host+port）缓存解析结果；任何拉取失败都按允许处理
#[derive(Clone)]
pub struct RobotsChecker {
    /// HTTP客户端
    client: Client,

    /// 内存缓存
    cache: Arc<Mutex<HashMap<String, CachedRobots>>>,

    /// 用于同步 Crawl-delay 的限流管理器
    rate_limits: Option<Arc<RateLimitManager>>,

    enabled: bool,
    user_agent: String,
    ttl: Duration,
    fetch_timeout: Duration,
}

#[async_trait]
impl RobotsPolicy for RobotsChecker {
    async fn can_fetch(&self, url: &str, user_agent: &str) -> bool {
        RobotsChecker::can_fetch(self, url, user_agent).await
    }

    async fn get_crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration> {
        RobotsChecker::get_crawl_delay(self, url, user_agent).await
    }
}

impl RobotsChecker {
    /// 创建新的Robots检查器实例
    pub fn new(
        client: Client,
        scraper: &ScraperSettings,
        robots: &RobotsSettings,
        rate_limits: Option<Arc<RateLimitManager>>,
    ) -> Self {
        Self {
            client,
            cache: Arc::new(Mutex::new(HashMap::new())),
            rate_limits,
            enabled: scraper.respect_robots,
            user_agent: scraper.user_agent.clone(),
            ttl: Duration::from_secs(robots.cache_ttl_secs),
            fetch_timeout: Duration::from_secs(robots.fetch_timeout_secs),
        }
    }

    /// 检查URL是否允许抓取
    pub async fn can_fetch(&self, url: &str, user_agent: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let Ok(parsed) = Url::parse(url) else {
            warn!("Cannot check robots.txt for unparsable URL {}", url);
            return true;
        };
        let rules = self.rules_for(url).await;
        let allowed = rules.is_allowed(parsed.path(), user_agent);
        debug!("Robots.txt check for {}: can_fetch={}", url, allowed);
        allowed
    }

    /// 获取 Crawl-delay，并同步到该域名的限流器
    pub async fn get_crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let delay = self.rules_for(url).await.crawl_delay(user_agent)?;
        if let Some(rate_limits) = &self.rate_limits {
            rate_limits.set_crawl_delay(url, delay);
        }
        Some(delay)
    }

    /// 获取（带缓存）某个URL所属源的规则
    pub async fn rules_for(&self, url: &str) -> Arc<RobotsRules> {
        let Some(origin) = origin_of(url) else {
            return Arc::new(RobotsRules::default());
        };

        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.get(&origin) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return cached.rules.clone();
                }
            }
        }

        let rules = Arc::new(self.fetch_rules(&origin).await);
        self.cache.lock().insert(
            origin,
            CachedRobots {
                rules: rules.clone(),
                fetched_at: Instant::now(),
            },
        );
        rules
    }

    async fn fetch_rules(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", origin);
        let response = self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.fetch_timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => match resp.text().await {
                Ok(body) => {
                    debug!("Fetched robots.txt from {}", robots_url);
                    RobotsRules::parse(&body)
                }
                Err(e) => {
                    warn!("Failed to read robots.txt from {}: {}", robots_url, e);
                    RobotsRules::default()
                }
            },
            Ok(resp) => {
                warn!(
                    "robots.txt unavailable at {} (status: {}), allowing access",
                    robots_url,
                    resp.status()
                );
                RobotsRules::default()
            }
            Err(e) => {
                warn!("Failed to fetch robots.txt from {}: {}", robots_url, e);
                RobotsRules::default()
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        debug!("Robots.txt cache cleared");
    }

    pub fn cache_stats(&self) -> RobotsCacheStats {
        let cache = self.cache.lock();
        let valid_entries = cache
            .values()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .count();
        RobotsCacheStats {
            total_entries: cache.len(),
            valid_entries,
            expired_entries: cache.len() - valid_entries,
            cache_ttl: self.ttl,
        }
    }
}

#[cfg(test)]
#[path = "robots_test.rs"]
mod tests;
