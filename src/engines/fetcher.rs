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

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::settings::ScraperSettings;
use crate::domain::services::rate_limiting_service::RateLimitManager;
use crate::engines::traits::{FetchedPage, PageFetcher};
use crate::utils::errors::{FetchError, ScrapingError};
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::robots::RobotsPolicy;
use crate::utils::url_utils::normalize_url;

/// 构建共享的HTTP客户端
///
/// 连接池复用，统一 User-Agent、超时与重定向上限
pub fn build_http_client(settings: &ScraperSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.request_timeout())
        .connect_timeout(settings.request_timeout())
        .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}

/// 带礼貌策略的HTTP抓取器
///
/// 依次执行：URL校验、robots检查、Crawl-delay同步、域名槽位获取、带退避的重试循环
pub struct HttpFetcher {
    client: Client,
    robots: Arc<dyn RobotsPolicy>,
    rate_limits: Arc<RateLimitManager>,
    retry_policy: RetryPolicy,
    user_agent: String,
    timeout: Duration,
}

enum Attempt {
    Done(Result<FetchedPage, ScrapingError>),
    Retry,
}

impl HttpFetcher {
    pub fn new(
        client: Client,
        robots: Arc<dyn RobotsPolicy>,
        rate_limits: Arc<RateLimitManager>,
        settings: &ScraperSettings,
    ) -> Self {
        Self {
            client,
            robots,
            rate_limits,
            retry_policy: RetryPolicy::from_settings(settings),
            user_agent: settings.user_agent.clone(),
            timeout: settings.request_timeout(),
        }
    }

    /// 执行一次抓取
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchedPage)` - 完整读取的响应
    /// * `Err(FetchError::InvalidUrl)` - URL不合法，未发出任何请求
    /// * `Err(FetchError::Scraping)` - robots拒绝、限流、HTTP错误、超时或连接错误
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage, FetchError> {
        let url = normalize_url(raw_url)?;

        if !self.robots.can_fetch(&url, &self.user_agent).await {
            record_outcome("robots_disallowed");
            return Err(ScrapingError::robots_disallowed(&url).into());
        }
        // pushes any Crawl-delay into the domain limiter before we queue on it
        self.robots.get_crawl_delay(&url, &self.user_agent).await;

        let _slot = self.rate_limits.acquire_domain_slot(&url).await;
        let max_retries = self.retry_policy.max_retries;

        for attempt in 0..=max_retries {
            match self.attempt(&url, attempt).await {
                Attempt::Done(result) => {
                    record_outcome(match &result {
                        Ok(_) => "success",
                        Err(e) => e.error_type.as_str(),
                    });
                    return result.map_err(FetchError::from);
                }
                Attempt::Retry => {
                    let backoff = self.retry_policy.calculate_backoff(attempt + 1);
                    counter!("siftrs_fetch_retries_total").increment(1);
                    debug!("Retrying {} in {:?} (attempt {})", url, backoff, attempt + 1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        record_outcome("unknown");
        Err(ScrapingError::unknown(&url, max_retries).into())
    }

    async fn attempt(&self, url: &str, attempt: u32) -> Attempt {
        let max_retries = self.retry_policy.max_retries;
        let can_retry = self.retry_policy.should_retry(attempt);
        let started = Instant::now();

        let response = match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => return self.transport_failure(url, attempt, can_retry, e),
        };

        let status = response.status().as_u16();
        let elapsed = started.elapsed();

        if status == 429 {
            warn!("Rate limited by {}", url);
            return Attempt::Done(Err(ScrapingError::rate_limited(
                url,
                attempt,
                max_retries,
                elapsed,
            )));
        }
        if status >= 500 {
            if can_retry {
                warn!("Server error {} for {}, retrying...", status, url);
                return Attempt::Retry;
            }
            return Attempt::Done(Err(ScrapingError::http_error(
                url,
                status,
                attempt,
                max_retries,
                elapsed,
            )));
        }
        if status >= 400 {
            return Attempt::Done(Err(ScrapingError::http_error(
                url,
                status,
                attempt,
                max_retries,
                elapsed,
            )));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        match response.text().await {
            Ok(body) => Attempt::Done(Ok(FetchedPage {
                url: url.to_string(),
                final_url,
                status_code: status,
                content_type,
                body,
                retry_count: attempt,
                elapsed: started.elapsed(),
            })),
            Err(e) => self.transport_failure(url, attempt, can_retry, e),
        }
    }

    fn transport_failure(
        &self,
        url: &str,
        attempt: u32,
        can_retry: bool,
        error: reqwest::Error,
    ) -> Attempt {
        let max_retries = self.retry_policy.max_retries;
        if error.is_timeout() {
            if can_retry {
                warn!("Timeout for {}, retrying...", url);
                return Attempt::Retry;
            }
            return Attempt::Done(Err(ScrapingError::timeout(url, attempt, max_retries)));
        }

        if can_retry {
            warn!("Connection error for {}, retrying...: {}", url, error);
            return Attempt::Retry;
        }
        Attempt::Done(Err(ScrapingError::connection_error(
            url,
            attempt,
            max_retries,
            transport_error_kind(&error),
            describe_error(&error),
        )))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        HttpFetcher::fetch(self, url).await
    }
}

fn record_outcome(outcome: &'static str) {
    counter!("siftrs_fetch_total", "outcome" => outcome).increment(1);
}

fn transport_error_kind(error: &reqwest::Error) -> &'static str {
    if error.is_connect() {
        "ConnectError"
    } else if error.is_redirect() {
        "TooManyRedirects"
    } else if error.is_body() {
        "BodyError"
    } else if error.is_decode() {
        "DecodeError"
    } else if error.is_request() {
        "RequestError"
    } else {
        "TransportError"
    }
}

// reqwest's Display hides the root cause; append the source chain
fn describe_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
#[path = "fetcher_test.rs"]
mod tests;
