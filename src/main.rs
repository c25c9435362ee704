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

use anyhow::Context;
use clap::Parser;
use siftrs::config::settings::Settings;
use siftrs::domain::models::query::{QueryCategory, ScrapeQuery};
use siftrs::domain::services::rate_limiting_service::RateLimitManager;
use siftrs::domain::services::scraper_orchestrator::ScraperOrchestrator;
use siftrs::utils::telemetry;
use siftrs::workers::rate_limiter_cleanup_worker::RateLimiterCleanupWorker;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// siftrs 命令行
#[derive(Parser, Debug)]
#[command(name = "siftrs")]
#[command(version)]
#[command(about = "Discover, fetch and extract web content for a query", long_about = None)]
struct Cli {
    /// 自然语言查询
    query: String,

    /// 查询分类（ai_tools, mutual_funds, general, documentation, tutorial）
    #[arg(short, long, default_value = "general", env = "SIFTRS_CATEGORY")]
    category: QueryCategory,

    /// 发现与提取的总截止时间（秒）
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// 美化输出的 JSON
    #[arg(long)]
    pretty: bool,
}

/// 主函数
///
/// 加载配置、初始化日志、启动限流器清理任务并执行一次抓取
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    telemetry::describe_metrics();

    let cli = Cli::parse();

    // 2. Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    info!("Starting siftrs for query '{}' ({})", cli.query, cli.category);

    // 3. Shared rate limiter and its background sweep
    let rate_limits = Arc::new(RateLimitManager::from_settings(&settings.rate_limiter));
    let cleanup =
        RateLimiterCleanupWorker::new(rate_limits.clone(), &settings.rate_limiter).start();

    // 4. Run the scrape
    let orchestrator = ScraperOrchestrator::from_settings(&settings, rate_limits)?;
    let query = ScrapeQuery::new(cli.query, cli.category);
    let report = match cli.deadline_secs {
        Some(secs) => {
            orchestrator
                .execute_with_deadline(query, Duration::from_secs(secs))
                .await?
        }
        None => orchestrator.execute(query).await?,
    };

    cleanup.abort();

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);

    Ok(())
}
