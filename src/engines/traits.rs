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
use std::time::Duration;

use crate::utils::errors::FetchError;

/// 抓取到的页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 规范化后的请求URL
    pub url: String,
    /// 跟随重定向后的最终URL
    pub final_url: String,
    /// HTTP状态码
    pub status_code: u16,
    /// 内容类型
    pub content_type: String,
    /// 完整响应正文
    pub body: String,
    /// 已使用的重试次数
    pub retry_count: u32,
    /// 最后一次请求耗时
    pub elapsed: Duration,
}

/// 页面抓取特质
///
/// 一次调用对应一次带重试的 GET，返回正文或类型化错误
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 执行抓取
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}
