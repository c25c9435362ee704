// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    HttpError,
    Timeout,
    ConnectionError,
    ParseError,
    RobotsDisallowed,
    RateLimited,
    ContentTooLarge,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::HttpError => "http_error",
            ErrorType::Timeout => "timeout",
            ErrorType::ConnectionError => "connection_error",
            ErrorType::ParseError => "parse_error",
            ErrorType::RobotsDisallowed => "robots_disallowed",
            ErrorType::RateLimited => "rate_limited",
            ErrorType::ContentTooLarge => "content_too_large",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抓取错误
///
/// 抓取层唯一对外暴露的错误类型，携带重试信息与建议延迟
#[derive(Error, Debug, Clone, Serialize)]
#[error("{error_type}: {message}")]
pub struct ScrapingError {
    /// 错误类别
    pub error_type: ErrorType,
    /// 错误描述
    pub message: String,
    /// 目标URL
    pub url: String,
    /// HTTP状态码
    pub status_code: Option<u16>,
    /// 已使用的重试次数
    pub retry_count: u32,
    /// 最大重试次数
    pub max_retries: u32,
    /// 调用方是否可以稍后重试
    pub can_retry: bool,
    /// 建议的重试延迟
    pub suggested_delay: Option<Duration>,
    /// 底层异常类型（连接错误时记录）
    pub exception_type: Option<String>,
    /// 底层异常详情
    pub exception_details: Option<String>,
    /// 最后一次尝试耗时
    pub processing_time: Option<Duration>,
}

impl ScrapingError {
    fn base(error_type: ErrorType, message: String, url: &str) -> Self {
        Self {
            error_type,
            message,
            url: url.to_string(),
            status_code: None,
            retry_count: 0,
            max_retries: 0,
            can_retry: false,
            suggested_delay: None,
            exception_type: None,
            exception_details: None,
            processing_time: None,
        }
    }

    /// robots.txt 禁止访问
    pub fn robots_disallowed(url: &str) -> Self {
        Self::base(
            ErrorType::RobotsDisallowed,
            format!("URL {} is disallowed by robots.txt", url),
            url,
        )
    }

    /// 目标站点返回 429
    pub fn rate_limited(url: &str, attempt: u32, max_retries: u32, elapsed: Duration) -> Self {
        Self {
            status_code: Some(429),
            retry_count: attempt,
            max_retries,
            can_retry: true,
            suggested_delay: Some(Duration::from_secs(60)),
            processing_time: Some(elapsed),
            ..Self::base(
                ErrorType::RateLimited,
                format!("Rate limited by {} (status: 429)", url),
                url,
            )
        }
    }

    /// HTTP 4xx/5xx 错误
    pub fn http_error(
        url: &str,
        status: u16,
        attempt: u32,
        max_retries: u32,
        elapsed: Duration,
    ) -> Self {
        let kind = if status >= 500 { "Server" } else { "Client" };
        Self {
            status_code: Some(status),
            retry_count: attempt,
            max_retries,
            processing_time: Some(elapsed),
            ..Self::base(
                ErrorType::HttpError,
                format!("{} error {} for {}", kind, status, url),
                url,
            )
        }
    }

    pub fn timeout(url: &str, attempt: u32, max_retries: u32) -> Self {
        Self {
            retry_count: attempt,
            max_retries,
            ..Self::base(
                ErrorType::Timeout,
                format!("Request timeout for {}", url),
                url,
            )
        }
    }

    pub fn connection_error(
        url: &str,
        attempt: u32,
        max_retries: u32,
        exception_type: &str,
        details: String,
    ) -> Self {
        Self {
            retry_count: attempt,
            max_retries,
            exception_type: Some(exception_type.to_string()),
            exception_details: Some(details.clone()),
            ..Self::base(
                ErrorType::ConnectionError,
                format!("Connection error for {}: {}", url, details),
                url,
            )
        }
    }

    /// 原始HTML超过大小上限
    pub fn content_too_large(url: &str, size: usize, limit: usize) -> Self {
        Self::base(
            ErrorType::ContentTooLarge,
            format!("HTML content too large: {} bytes (limit {})", size, limit),
            url,
        )
    }

    pub fn unknown(url: &str, max_retries: u32) -> Self {
        Self {
            retry_count: max_retries,
            max_retries,
            ..Self::base(
                ErrorType::Unknown,
                format!("All retry attempts failed for {}", url),
                url,
            )
        }
    }
}

/// URL 校验错误
///
/// 属于调用方契约错误，不参与重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidUrlError {
    #[error("无效的URL格式: {0}")]
    Parse(String),

    #[error("不支持的URL协议 '{scheme}': {url}")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("URL缺少主机名: {0}")]
    MissingHost(String),

    #[error("URL缺少有效域名: {0}")]
    MissingDot(String),
}

/// 抓取层错误
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidUrlError),

    #[error(transparent)]
    Scraping(#[from] ScrapingError),
}

impl FetchError {
    /// 用于错误汇总的分类键
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::Scraping(e) => e.error_type.as_str(),
        }
    }

    pub fn as_scraping(&self) -> Option<&ScrapingError> {
        match self {
            FetchError::Scraping(e) => Some(e),
            FetchError::InvalidUrl(_) => None,
        }
    }
}
