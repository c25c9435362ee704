// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::describe_counter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,siftrs=debug";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 从 `SIFTRS_LOG_FORMAT` 读取，未设置或无法识别时使用文本格式
    pub fn from_env() -> Self {
        match std::env::var("SIFTRS_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// 初始化日志
///
/// 过滤规则取自 `RUST_LOG`，默认 `info,siftrs=debug`。重复调用不会报错。
pub fn init_telemetry() {
    init_with_format(LogFormat::from_env());
}

pub fn init_with_format(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    // a global subscriber may already be installed (tests, embedding apps)
    let _ = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
}

/// 注册指标描述
///
/// 库本身不安装导出器，没有 recorder 时记录为空操作
pub fn describe_metrics() {
    describe_counter!(
        "siftrs_fetch_total",
        "Total number of fetch outcomes, labelled by outcome"
    );
    describe_counter!(
        "siftrs_fetch_retries_total",
        "Total number of fetch retries scheduled after transient failures"
    );
    describe_counter!(
        "siftrs_extraction_total",
        "Total number of content extractions, labelled by winning strategy"
    );
    describe_counter!(
        "siftrs_orchestrator_failures_total",
        "Total number of per-site failures recorded by the orchestrator"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_with_format(LogFormat::Text);
        init_with_format(LogFormat::Json);
        describe_metrics();
        tracing::info!("telemetry initialised twice without panicking");
    }
}
