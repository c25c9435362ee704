// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::RateLimiterSettings;
use crate::utils::url_utils::domain_key;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// 单个域名的限流器
///
/// 同一时刻只放行一个请求，并保证相邻两次请求的间隔不小于 `delay`
pub struct DomainRateLimiter {
    domain: String,
    /// 准入闸门，内部保存上一次请求时间
    gate: Arc<AsyncMutex<Option<Instant>>>,
    /// 请求间隔，只增不减
    delay: Mutex<Duration>,
    request_count: AtomicU64,
    last_activity: Mutex<Instant>,
}

/// 域名请求槽位
///
/// 持有期间同域名的其他请求会等待，离开作用域时自动释放
pub struct DomainSlot {
    domain: String,
    _guard: OwnedMutexGuard<Option<Instant>>,
}

impl DomainSlot {
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// 限流器统计信息
#[derive(Debug, Clone, Serialize)]
pub struct DomainLimiterStats {
    pub domain: String,
    pub delay: Duration,
    pub request_count: u64,
    pub idle_for: Duration,
    pub in_flight: bool,
}

impl DomainRateLimiter {
    pub fn new(domain: impl Into<String>, delay: Duration) -> Self {
        Self {
            domain: domain.into(),
            gate: Arc::new(AsyncMutex::new(None)),
            delay: Mutex::new(delay),
            request_count: AtomicU64::new(0),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// 获取请求槽位
    ///
    /// 先拿到域名闸门，再等待距上次请求不足 `delay` 的剩余时间
    pub async fn acquire(&self) -> DomainSlot {
        let mut guard = self.gate.clone().lock_owned().await;

        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            let delay = self.delay();
            if elapsed < delay {
                let wait = delay - elapsed;
                debug!("Rate limiting {}: waiting {:?}", self.domain, wait);
                tokio::time::sleep(wait).await;
            }
        }

        let now = Instant::now();
        *guard = Some(now);
        *self.last_activity.lock() = now;
        self.request_count.fetch_add(1, Ordering::Relaxed);

        DomainSlot {
            domain: self.domain.clone(),
            _guard: guard,
        }
    }

    /// 提高请求间隔，不会降低已有的值
    pub fn set_crawl_delay(&self, delay: Duration) {
        let mut current = self.delay.lock();
        if delay > *current {
            debug!(
                "Raising delay for {} from {:?} to {:?}",
                self.domain, *current, delay
            );
            *current = delay;
        }
    }

    pub fn delay(&self) -> Duration {
        *self.delay.lock()
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    pub fn stats(&self) -> DomainLimiterStats {
        DomainLimiterStats {
            domain: self.domain.clone(),
            delay: self.delay(),
            request_count: self.request_count(),
            idle_for: self.idle_for(),
            in_flight: self.is_busy(),
        }
    }
}

/// 域名限流管理器
///
/// 按小写主机名懒创建限流器，不同域名互不阻塞
pub struct RateLimitManager {
    limiters: DashMap<String, Arc<DomainRateLimiter>>,
    default_delay: Duration,
}

impl RateLimitManager {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            limiters: DashMap::new(),
            default_delay,
        }
    }

    pub fn from_settings(settings: &RateLimiterSettings) -> Self {
        Self::new(settings.default_delay())
    }

    fn key_for(url: &str) -> String {
        domain_key(url).unwrap_or_else(|| url.trim().to_lowercase())
    }

    /// 获取（必要时创建）域名限流器
    pub fn limiter_for(&self, url: &str) -> Arc<DomainRateLimiter> {
        let key = Self::key_for(url);
        if let Some(limiter) = self.limiters.get(&key) {
            return limiter.clone();
        }
        self.limiters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(DomainRateLimiter::new(key, self.default_delay)))
            .clone()
    }

    /// 获取域名请求槽位，返回值离开作用域即释放
    pub async fn acquire_domain_slot(&self, url: &str) -> DomainSlot {
        let limiter = self.limiter_for(url);
        limiter.acquire().await
    }

    /// 设置域名的抓取间隔（取当前值与新值的较大者）
    pub fn set_crawl_delay(&self, url: &str, delay: Duration) {
        self.limiter_for(url).set_crawl_delay(delay);
    }

    /// 清理空闲超过 `max_age` 的限流器
    ///
    /// 正在使用或仍被其他任务引用的限流器会被保留
    pub fn cleanup_inactive(&self, max_age: Duration) -> usize {
        let before = self.limiters.len();
        self.limiters.retain(|_, limiter| {
            let idle = limiter.idle_for() > max_age;
            let unreferenced = Arc::strong_count(limiter) == 1;
            !(idle && unreferenced && !limiter.is_busy())
        });
        before.saturating_sub(self.limiters.len())
    }

    pub fn stats(&self) -> Vec<DomainLimiterStats> {
        let mut stats: Vec<_> = self.limiters.iter().map(|l| l.stats()).collect();
        stats.sort_by(|a, b| a.domain.cmp(&b.domain));
        stats
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl Default for RateLimitManager {
    fn default() -> Self {
        Self::from_settings(&RateLimiterSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_waits_for_delay() {
        let manager = RateLimitManager::new(Duration::from_secs(2));

        let first = manager.acquire_domain_slot("https://example.com/a").await;
        drop(first);

        let start = Instant::now();
        let second = manager.acquire_domain_slot("https://EXAMPLE.com/b").await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(second.domain(), "example.com");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_elapsed_only_waits_remainder() {
        let manager = RateLimitManager::new(Duration::from_secs(3));

        drop(manager.acquire_domain_slot("https://example.com").await);
        tokio::time::advance(Duration::from_secs(2)).await;

        let start = Instant::now();
        let _slot = manager.acquire_domain_slot("https://example.com").await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_domains_do_not_block() {
        let manager = RateLimitManager::new(Duration::from_secs(10));

        let _held = manager.acquire_domain_slot("https://a.example.com").await;
        let other = tokio::time::timeout(
            Duration::from_millis(1),
            manager.acquire_domain_slot("https://b.example.com"),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_serializes_while_slot_held() {
        let manager = Arc::new(RateLimitManager::new(Duration::ZERO));

        let held = manager.acquire_domain_slot("https://a.example.com").await;
        let blocked = tokio::time::timeout(
            Duration::from_secs(5),
            manager.acquire_domain_slot("https://a.example.com/other"),
        )
        .await;
        assert!(blocked.is_err());

        drop(held);
        let _slot = manager.acquire_domain_slot("https://a.example.com").await;
    }

    #[tokio::test]
    async fn test_concurrent_first_access_creates_one_limiter() {
        let manager = Arc::new(RateLimitManager::new(Duration::ZERO));

        let mut handles = Vec::new();
        for i in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let _slot = manager
                    .acquire_domain_slot(&format!("https://shared.example.com/{}", i))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.stats()[0].request_count, 16);
    }

    #[test]
    fn test_set_crawl_delay_never_lowers() {
        let manager = RateLimitManager::new(Duration::from_secs(1));

        manager.set_crawl_delay("https://example.com", Duration::from_secs(5));
        manager.set_crawl_delay("https://example.com", Duration::from_secs(2));

        let limiter = manager.limiter_for("https://example.com/page");
        assert_eq!(limiter.delay(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_only_idle_limiters() {
        let manager = RateLimitManager::new(Duration::ZERO);

        drop(manager.acquire_domain_slot("https://old.example.com").await);
        tokio::time::advance(Duration::from_secs(100)).await;
        let _held = manager.acquire_domain_slot("https://busy.example.com").await;
        drop(manager.acquire_domain_slot("https://fresh.example.com").await);

        let removed = manager.cleanup_inactive(Duration::from_secs(50));
        assert_eq!(removed, 1);

        let domains: Vec<_> = manager.stats().into_iter().map(|s| s.domain).collect();
        assert_eq!(domains, vec!["busy.example.com", "fresh.example.com"]);
    }
}
