// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::settings::RateLimiterSettings;
use crate::domain::services::rate_limiting_service::RateLimitManager;

/// 清理间隔下限
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// 限流器清理工作器
///
/// 定期移除空闲超过 `max_age` 的域名限流器。单次清理失败只记录日志，
/// 不影响后续清理；通过中止返回的 `JoinHandle` 停止。
pub struct RateLimiterCleanupWorker {
    rate_limits: Arc<RateLimitManager>,
    interval: Duration,
    max_age: Duration,
}

impl RateLimiterCleanupWorker {
    pub fn new(rate_limits: Arc<RateLimitManager>, settings: &RateLimiterSettings) -> Self {
        let mut interval = settings.cleanup_interval();
        if interval < MIN_INTERVAL {
            warn!("Cleanup interval {:?} is too short, using {:?}", interval, MIN_INTERVAL);
            interval = MIN_INTERVAL;
        }
        Self {
            rate_limits,
            interval,
            max_age: settings.max_age(),
        }
    }

    /// 运行工作器
    pub async fn run(&self) {
        info!(
            "Rate limiter cleanup worker started (interval {:?}, max age {:?})",
            self.interval, self.max_age
        );

        let mut interval = tokio::time::interval(self.interval);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            match self.sweep().await {
                Ok(0) => debug!("No inactive rate limiters to remove"),
                Ok(count) => info!("Removed {} inactive rate limiters", count),
                Err(e) => error!("Rate limiter cleanup failed: {}", e),
            }
        }
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    // each sweep runs in its own task so a panic cannot end the loop
    async fn sweep(&self) -> Result<usize, String> {
        let rate_limits = self.rate_limits.clone();
        let max_age = self.max_age;
        tokio::spawn(async move { rate_limits.cleanup_inactive(max_age) })
            .await
            .map_err(|e| e.to_string())
    }
}
