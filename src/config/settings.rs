// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含抓取、限流、robots、站点发现、内容提取和LLM等所有配置项
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 抓取配置
    pub scraper: ScraperSettings,
    /// 域名限流配置
    pub rate_limiter: RateLimiterSettings,
    /// robots.txt 配置
    pub robots: RobotsSettings,
    /// 站点发现配置
    pub discovery: DiscoverySettings,
    /// 内容提取配置
    pub extraction: ExtractionSettings,
    /// LLM配置
    pub llm: LlmSettings,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// 全局提取并发数
    pub concurrency: usize,
    /// 单次请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 最大重试次数
    pub max_retries: u32,
    /// 最大重定向次数
    pub max_redirects: usize,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 原始HTML大小上限（字节）
    pub content_size_limit: usize,
    /// 指数退避的基础时间（毫秒）
    pub retry_backoff_ms: u64,
    /// 是否遵守 robots.txt
    pub respect_robots: bool,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            request_timeout_secs: 20,
            max_retries: 3,
            max_redirects: 5,
            user_agent: "siftrs-bot/1.0".to_string(),
            content_size_limit: 10 * 1024 * 1024,
            retry_backoff_ms: 1000,
            respect_robots: true,
        }
    }
}

impl ScraperSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 域名限流配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimiterSettings {
    /// 同一域名两次请求的默认间隔（毫秒）
    pub default_delay_ms: u64,
    /// 空闲清理间隔（秒）
    pub cleanup_interval_secs: u64,
    /// 限流器最大空闲时间（秒）
    pub max_age_secs: u64,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            default_delay_ms: 1000,
            cleanup_interval_secs: 3600,
            max_age_secs: 24 * 3600,
        }
    }
}

impl RateLimiterSettings {
    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// robots.txt 配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotsSettings {
    /// 缓存有效期（秒）
    pub cache_ttl_secs: u64,
    /// 拉取 robots.txt 的超时时间（秒）
    pub fetch_timeout_secs: u64,
}

impl Default for RobotsSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            fetch_timeout_secs: 10,
        }
    }
}

/// 站点发现配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// 启用LLM发现
    pub enable_llm: bool,
    /// 启用规则发现
    pub enable_rules: bool,
    /// 启用搜索引擎发现（预留）
    pub enable_search: bool,
    /// 最大返回站点数
    pub max_results: usize,
    /// 最低相关度阈值
    pub min_relevance: f64,
    /// LLM 采样温度
    pub llm_temperature: f32,
    /// LLM 最大输出 token 数
    pub llm_max_tokens: u32,
    /// 受信任域名
    pub trusted_domains: Vec<String>,
    /// 额外的分类域名表，追加到内置表
    pub domain_patterns: HashMap<String, Vec<String>>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            enable_llm: true,
            enable_rules: true,
            enable_search: false,
            max_results: 20,
            min_relevance: 0.3,
            llm_temperature: 0.3,
            llm_max_tokens: 2000,
            trusted_domains: Vec::new(),
            domain_patterns: HashMap::new(),
        }
    }
}

/// 内容提取配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// 每个提取策略的最短有效长度（字符）
    pub min_content_length: usize,
    /// 清洗后正文的最大长度（字节）
    pub max_content_length: usize,
    /// 优先使用 main/article 等内容容器
    pub prefer_main_content: bool,
    pub enable_json_ld: bool,
    pub enable_open_graph: bool,
    pub enable_generic: bool,
    pub remove_ads: bool,
    pub normalize_whitespace: bool,
    pub remove_duplicate_lines: bool,
    pub include_images: bool,
    pub include_links: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            min_content_length: 100,
            max_content_length: 10 * 1024 * 1024,
            prefer_main_content: true,
            enable_json_ld: true,
            enable_open_graph: true,
            enable_generic: true,
            remove_ads: true,
            normalize_whitespace: true,
            remove_duplicate_lines: true,
            include_images: true,
            include_links: true,
        }
    }
}

/// LLM配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API密钥，未配置时LLM能力不可用
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    /// OpenAI 兼容接口地址
    pub api_base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、配置文件与 `SIFTRS__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("scraper.concurrency", 5)?
            .set_default("scraper.request_timeout_secs", 20)?
            .set_default("scraper.max_retries", 3)?
            .set_default("scraper.user_agent", "siftrs-bot/1.0")?
            .set_default("scraper.respect_robots", true)?
            .set_default("rate_limiter.default_delay_ms", 1000)?
            .set_default("robots.cache_ttl_secs", 3600)?
            .set_default("discovery.max_results", 20)?
            .set_default("discovery.min_relevance", 0.3)?
            .set_default("extraction.min_content_length", 100)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("SIFTRS")
                    .prefix_separator("__")
                    .separator("__"),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
